use thiserror::Error;

/// Errors resolving or preparing platform directories.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("path error: {0}")]
    Path(String),

    #[error("cannot prepare directory: {0}")]
    Io(#[from] std::io::Error),
}
