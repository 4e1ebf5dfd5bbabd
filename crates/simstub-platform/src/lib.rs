pub mod error;
pub mod paths;

pub use error::PlatformError;
pub use paths::{ensure_dir, DefaultPaths, PlatformPaths, RootedPaths, APP_NAME};

/// Pick the directory layout: `root` when given, the platform's standard
/// locations otherwise.
///
/// # Errors
///
/// Returns `PlatformError` if the standard locations cannot be resolved.
pub fn resolve_paths(root: Option<&std::path::Path>) -> Result<Box<dyn PlatformPaths>, PlatformError> {
    match root {
        Some(root) => Ok(Box::new(RootedPaths::new(root))),
        None => Ok(Box::new(DefaultPaths::new()?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolve_paths_prefers_root() {
        let paths = resolve_paths(Some(Path::new("/opt/simstub"))).unwrap();
        assert_eq!(paths.config_dir(), Path::new("/opt/simstub"));
    }

    #[test]
    fn resolve_paths_defaults_to_platform() {
        let paths = resolve_paths(None).expect("should resolve directories");
        assert!(paths.config_dir().ends_with(APP_NAME));
    }
}
