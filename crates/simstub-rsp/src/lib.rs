//! simstub-rsp: GDB Remote Serial Protocol engine.
//!
//! This crate implements the stub side of the protocol: packet framing and
//! checksums, acknowledgment and retransmission, command parsing, the
//! session state machine, and dispatch of commands to a
//! [`TargetAdapter`](simstub_target::TargetAdapter). It performs no I/O.

pub mod breakpoint;
pub mod codec;
pub mod command;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod registers;
pub mod reply;
pub mod session;

pub use breakpoint::BreakpointSet;
pub use codec::{FrameDecoder, Inbound, Packet};
pub use command::{BreakpointKind, Command};
pub use dispatch::{dispatch, Outcome};
pub use engine::{Action, Engine};
pub use error::{FramingError, ProtocolError, SessionError};
pub use reply::Reply;
pub use session::{ResumeKind, ResumeRequest, Session, SessionConfig, SessionState, StopReason};
