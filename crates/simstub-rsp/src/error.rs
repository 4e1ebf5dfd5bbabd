//! RSP error types.

use thiserror::Error;

/// Errors raised while decoding a wire frame.
///
/// Framing errors never reach the dispatcher: the engine answers them with
/// a negative acknowledgment and waits for the debugger to retransmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The trailing checksum disagrees with the payload.
    #[error("checksum mismatch: frame says {expected:02x}, payload sums to {computed:02x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame.
        expected: u8,
        /// Checksum computed over the received payload.
        computed: u8,
    },

    /// Markers, checksum digits or escape sequences are invalid.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The input ends before a complete frame.
    #[error("truncated frame")]
    Truncated,
}

/// Errors in a well-framed command, reported to the debugger as `Exx`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The command payload could not be parsed.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// A register index outside `[0, register_count)`.
    #[error("unknown register {0}")]
    UnknownRegister(usize),

    /// A `G` payload of the wrong size or with invalid hex.
    #[error("malformed register data: expected {expected} bytes, got {actual}")]
    MalformedRegisters {
        /// Bytes required by the register file.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// The reply would not fit in the negotiated packet size.
    #[error("request too large: {requested} bytes, limit {limit}")]
    RequestTooLarge {
        /// Requested data length in bytes.
        requested: u64,
        /// Largest length that fits a reply packet.
        limit: u64,
    },

    /// The session cannot honour the command in its current state.
    #[error("invalid session state: {0}")]
    InvalidState(#[from] SessionError),
}

impl ProtocolError {
    /// The error number sent to the debugger in an `Exx` reply.
    pub fn code(&self) -> u8 {
        match self {
            ProtocolError::MalformedCommand(_) => 0x01,
            ProtocolError::UnknownRegister(_) => 0x02,
            ProtocolError::MalformedRegisters { .. } => 0x03,
            ProtocolError::RequestTooLarge { .. } => 0x04,
            ProtocolError::InvalidState(_) => 0x05,
        }
    }
}

/// Session lifecycle violations and link-quality failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A debugger is already attached.
    #[error("session already attached")]
    AlreadyAttached,

    /// No debugger is attached.
    #[error("no debugger attached")]
    NotAttached,

    /// The target is already executing.
    #[error("target is running")]
    Busy,

    /// A stop was reported while nothing was running.
    #[error("target is not running")]
    NotRunning,

    /// The debugger kept rejecting the same frame.
    #[error("gave up after {0} retransmissions")]
    TooManyRetransmits(u32),

    /// The link delivered too many corrupt frames in a row.
    #[error("gave up after {0} consecutive framing errors")]
    TooManyFramingErrors(u32),
}
