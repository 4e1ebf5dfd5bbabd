//! simstub-server: TCP front end for the RSP engine.
//!
//! Accepts one debugger at a time, feeds its bytes to an
//! [`Engine`](simstub_rsp::Engine), and runs the target on tokio's blocking
//! pool so interrupts keep arriving while it executes.

pub mod connection;
pub mod error;
pub mod options;
pub mod server;

pub use connection::handle_connection;
pub use error::ServerError;
pub use options::{ServerOptions, DEFAULT_PORT};
pub use server::Server;
