//! Replies sent back to the debugger.

use crate::error::ProtocolError;
use crate::session::StopReason;

/// The response to one command, before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Empty packet: the command is not supported.
    Empty,
    /// `OK`
    Ok,
    /// Hex data or a query response, sent verbatim.
    Data(String),
    /// `Exx`
    Error(ProtocolError),
    /// `Sxx` / `Wxx`
    Stop(StopReason),
}

impl Reply {
    /// Render the packet payload.
    pub fn to_payload(&self) -> Vec<u8> {
        match self {
            Reply::Empty => Vec::new(),
            Reply::Ok => b"OK".to_vec(),
            Reply::Data(data) => data.clone().into_bytes(),
            Reply::Error(err) => format!("E{:02x}", err.code()).into_bytes(),
            Reply::Stop(stop) => stop.to_payload().into_bytes(),
        }
    }
}

impl From<ProtocolError> for Reply {
    fn from(err: ProtocolError) -> Self {
        Reply::Error(err)
    }
}
