use std::path::{Path, PathBuf};

use crate::error::PlatformError;

/// Directory name used under the platform's standard locations.
pub const APP_NAME: &str = "simstub";

/// Where simstub keeps its files.
pub trait PlatformPaths: Send + Sync {
    /// Returns the configuration directory (`~/.config/simstub` on Linux).
    fn config_dir(&self) -> PathBuf;
    /// Returns the data directory (`~/.local/share/simstub` on Linux).
    fn data_dir(&self) -> PathBuf;
    /// Returns the log directory (`<data_dir>/logs`).
    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// Standard per-user locations, resolved with the `dirs` crate.
#[derive(Debug, Clone)]
pub struct DefaultPaths {
    config: PathBuf,
    data: PathBuf,
}

impl DefaultPaths {
    /// Resolve the per-user directories.
    ///
    /// Falls back to `$HOME/.config` and `$HOME/.local/share` when the
    /// platform reports no standard location.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if no home directory can be found.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir().or_else(|| std::env::var_os("HOME").map(PathBuf::from));
        let config = dirs::config_dir()
            .or_else(|| home.as_ref().map(|h| h.join(".config")))
            .ok_or_else(|| PlatformError::Path("could not determine config directory".into()))?;
        let data = dirs::data_dir()
            .or_else(|| home.as_ref().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| PlatformError::Path("could not determine data directory".into()))?;
        Ok(Self {
            config: config.join(APP_NAME),
            data: data.join(APP_NAME),
        })
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.config.clone()
    }

    fn data_dir(&self) -> PathBuf {
        self.data.clone()
    }
}

/// Everything under one root directory, for `--config-dir` and tests.
#[derive(Debug, Clone)]
pub struct RootedPaths {
    root: PathBuf,
}

impl RootedPaths {
    /// Use `root` as the configuration directory and `root/data` for data.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PlatformPaths for RootedPaths {
    fn config_dir(&self) -> PathBuf {
        self.root.clone()
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }
}

/// Create `dir` and its parents if needed.
///
/// # Errors
///
/// Returns `PlatformError::Io` when the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<(), PlatformError> {
    if !dir.is_dir() {
        tracing::debug!("Creating {}", dir.display());
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
