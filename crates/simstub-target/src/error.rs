//! Adapter fault types.

use thiserror::Error;

use crate::signal::Signal;

/// An unrecoverable fault raised by a target while executing.
///
/// The debug stub never propagates these as errors: they become a stop
/// reply carrying [`AdapterFault::signal`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterFault {
    /// The program counter points outside fetchable memory.
    #[error("instruction fetch outside memory at {address:#x}")]
    FetchOutOfBounds {
        /// The faulting program counter.
        address: u64,
    },

    /// The fetched instruction could not be decoded.
    #[error("illegal instruction at {address:#x}")]
    IllegalInstruction {
        /// The faulting program counter.
        address: u64,
    },

    /// Any other simulator-specific fault.
    #[error("target fault ({signal}): {message}")]
    Internal {
        /// Signal to report to the debugger.
        signal: Signal,
        /// Human-readable description.
        message: String,
    },
}

impl AdapterFault {
    /// The signal reported to the debugger for this fault.
    pub fn signal(&self) -> Signal {
        match self {
            AdapterFault::FetchOutOfBounds { .. } => Signal::SEGV,
            AdapterFault::IllegalInstruction { .. } => Signal::ILL,
            AdapterFault::Internal { signal, .. } => *signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_out_of_bounds_display_and_signal() {
        let err = AdapterFault::FetchOutOfBounds { address: 0x1000 };
        assert_eq!(err.to_string(), "instruction fetch outside memory at 0x1000");
        assert_eq!(err.signal(), Signal::SEGV);
    }

    #[test]
    fn illegal_instruction_maps_to_sigill() {
        let err = AdapterFault::IllegalInstruction { address: 4 };
        assert_eq!(err.signal(), Signal::ILL);
    }

    #[test]
    fn internal_fault_keeps_signal() {
        let err = AdapterFault::Internal {
            signal: Signal::BUS,
            message: "bus timeout".into(),
        };
        assert_eq!(err.signal(), Signal::BUS);
        assert!(err.to_string().contains("bus timeout"));
        assert!(err.to_string().contains("SIGBUS"));
    }
}
