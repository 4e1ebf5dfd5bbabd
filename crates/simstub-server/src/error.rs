//! Server error types.

use simstub_rsp::SessionError;

/// Errors from the TCP front end.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be created.
    #[error("cannot listen on {address}: {source}")]
    Bind {
        /// The address we tried to bind.
        address: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session refused a transition.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The blocking task running the target panicked or was cancelled.
    #[error("target task failed: {0}")]
    TaskFailed(String),
}
