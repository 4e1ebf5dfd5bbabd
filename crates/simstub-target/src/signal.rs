//! Signal numbers reported to the debugger in stop replies.

use std::fmt;

/// A GDB signal number, as carried by `S` and `T` stop replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(pub u8);

impl Signal {
    /// Interrupted by the debugger (`^C`).
    pub const INT: Signal = Signal(2);
    /// Illegal instruction.
    pub const ILL: Signal = Signal(4);
    /// Trace/breakpoint trap. Used for breakpoints and completed steps.
    pub const TRAP: Signal = Signal(5);
    /// Bus error.
    pub const BUS: Signal = Signal(7);
    /// Segmentation fault.
    pub const SEGV: Signal = Signal(11);

    /// Raw signal number.
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Signal::INT => "SIGINT",
            Signal::ILL => "SIGILL",
            Signal::TRAP => "SIGTRAP",
            Signal::BUS => "SIGBUS",
            Signal::SEGV => "SIGSEGV",
            Signal(n) => return write!(f, "signal {n}"),
        };
        f.write_str(name)
    }
}
