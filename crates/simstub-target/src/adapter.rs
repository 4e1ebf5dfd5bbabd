//! The [`TargetAdapter`] trait.

use crate::error::AdapterFault;

/// Result of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// One instruction retired; the target can keep running.
    Executed,
    /// The simulated program finished with the given exit code.
    Exited(u8),
}

/// Architecture-neutral view of a simulated processor.
///
/// Register indices follow the debugger's register numbering for the
/// architecture; the debug stub validates them against
/// [`register_count`](TargetAdapter::register_count) before calling
/// [`read_register`](TargetAdapter::read_register) or
/// [`write_register`](TargetAdapter::write_register), so implementations
/// only ever see indices in range.
///
/// Memory accessors are total: addresses outside the simulated memory
/// read as `0` and writes to them are ignored.
pub trait TargetAdapter {
    /// Whether register values are serialized most-significant byte first.
    fn is_big_endian(&self) -> bool;

    /// Ask the target to stop at its next safe point.
    fn halt(&mut self);

    /// Number of registers in the debugger's register packet.
    /// Must not change while a debugger is attached.
    fn register_count(&self) -> usize;

    /// Width of every register in bytes, `1..=8`.
    fn register_width(&self) -> usize;

    /// Index of the program counter in the register numbering.
    fn pc_register(&self) -> usize;

    /// Read a register. Only the low [`register_width`](Self::register_width)
    /// bytes are significant.
    fn read_register(&self, index: usize) -> u64;

    /// Write a register.
    fn write_register(&mut self, index: usize, value: u64);

    /// Redirect the next instruction fetch to `value`.
    fn set_program_counter(&mut self, value: u64);

    /// Read one byte of memory.
    fn read_byte(&self, address: u64) -> u8;

    /// Write one byte of memory.
    fn write_byte(&mut self, address: u64, byte: u8);

    /// Execute exactly one instruction.
    fn step(&mut self) -> Result<Execution, AdapterFault>;

    /// Current program counter.
    fn program_counter(&self) -> u64 {
        self.read_register(self.pc_register())
    }
}

impl<T: TargetAdapter + ?Sized> TargetAdapter for Box<T> {
    fn is_big_endian(&self) -> bool {
        (**self).is_big_endian()
    }

    fn halt(&mut self) {
        (**self).halt()
    }

    fn register_count(&self) -> usize {
        (**self).register_count()
    }

    fn register_width(&self) -> usize {
        (**self).register_width()
    }

    fn pc_register(&self) -> usize {
        (**self).pc_register()
    }

    fn read_register(&self, index: usize) -> u64 {
        (**self).read_register(index)
    }

    fn write_register(&mut self, index: usize, value: u64) {
        (**self).write_register(index, value)
    }

    fn set_program_counter(&mut self, value: u64) {
        (**self).set_program_counter(value)
    }

    fn read_byte(&self, address: u64) -> u8 {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: u64, byte: u8) {
        (**self).write_byte(address, byte)
    }

    fn step(&mut self) -> Result<Execution, AdapterFault> {
        (**self).step()
    }

    fn program_counter(&self) -> u64 {
        (**self).program_counter()
    }
}
