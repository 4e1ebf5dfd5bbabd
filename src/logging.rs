use std::path::PathBuf;

use anyhow::{Context, Result};
use simstub_config::LogConfig;
use simstub_platform::{ensure_dir, PlatformPaths};
use tracing_subscriber::EnvFilter;

/// Where the log goes: `None` means stderr. Relative paths live in the
/// platform log directory.
pub(crate) fn log_path(config: &LogConfig, paths: &dyn PlatformPaths) -> Option<PathBuf> {
    config.file.as_ref().map(|file| {
        if file.is_absolute() {
            file.clone()
        } else {
            paths.log_dir().join(file)
        }
    })
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub(crate) fn init(config: &LogConfig, paths: &dyn PlatformPaths) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    match log_path(config, paths) {
        Some(path) => {
            if let Some(dir) = path.parent() {
                ensure_dir(dir).context("failed to create log directory")?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_env_filter(filter)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simstub_platform::RootedPaths;

    #[test]
    fn log_path_defaults_to_stderr() {
        let paths = RootedPaths::new("/srv/stub");
        assert_eq!(log_path(&LogConfig::default(), &paths), None);
    }

    #[test]
    fn log_path_relative_goes_to_log_dir() {
        let paths = RootedPaths::new("/srv/stub");
        let config = LogConfig {
            file: Some(PathBuf::from("simstub.log")),
            ..Default::default()
        };
        assert_eq!(
            log_path(&config, &paths),
            Some(PathBuf::from("/srv/stub/data/logs/simstub.log"))
        );
    }

    #[test]
    fn log_path_absolute_is_kept() {
        let paths = RootedPaths::new("/srv/stub");
        let config = LogConfig {
            file: Some(PathBuf::from("/var/log/simstub.log")),
            ..Default::default()
        };
        assert_eq!(
            log_path(&config, &paths),
            Some(PathBuf::from("/var/log/simstub.log"))
        );
    }
}
