//! A reference target: flat RAM plus a plain register file.
//!
//! `FlatTarget` has no instruction set. Each step checks that the
//! instruction at the program counter lies inside memory and advances the
//! program counter by a fixed instruction width. That is enough to drive
//! every path of the debug stub: stepping, breakpoints, exits and faults.

use tracing::trace;

use crate::adapter::{Execution, TargetAdapter};
use crate::error::AdapterFault;

/// Geometry of a [`FlatTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatTargetConfig {
    /// Number of registers exposed to the debugger.
    pub register_count: usize,
    /// Register width in bytes (1–8).
    pub register_width: usize,
    /// Index of the program counter.
    pub pc_register: usize,
    /// Big-endian register serialization.
    pub big_endian: bool,
    /// Address of the first byte of RAM.
    pub memory_base: u64,
    /// RAM size in bytes.
    pub memory_size: usize,
    /// Bytes the program counter advances per step.
    pub instruction_width: u64,
    /// Reaching this address ends the program with exit code 0.
    pub exit_address: Option<u64>,
}

impl Default for FlatTargetConfig {
    fn default() -> Self {
        Self {
            register_count: 33,
            register_width: 4,
            pc_register: 32,
            big_endian: false,
            memory_base: 0,
            memory_size: 64 * 1024,
            instruction_width: 4,
            exit_address: None,
        }
    }
}

/// Reference [`TargetAdapter`] implementation.
#[derive(Debug, Clone)]
pub struct FlatTarget {
    config: FlatTargetConfig,
    registers: Vec<u64>,
    memory: Vec<u8>,
    halt_requested: bool,
    steps: u64,
}

impl FlatTarget {
    /// Create a machine with zeroed registers and memory.
    ///
    /// The register width is clamped to `1..=8` and the program counter
    /// index to the register file.
    pub fn new(mut config: FlatTargetConfig) -> Self {
        config.register_width = config.register_width.clamp(1, 8);
        config.register_count = config.register_count.max(1);
        config.pc_register = config.pc_register.min(config.register_count - 1);
        let registers = vec![0; config.register_count];
        let memory = vec![0; config.memory_size];
        Self {
            config,
            registers,
            memory,
            halt_requested: false,
            steps: 0,
        }
    }

    /// The machine's geometry.
    pub fn config(&self) -> &FlatTargetConfig {
        &self.config
    }

    /// Copy `bytes` into memory starting at `address`. Bytes falling
    /// outside RAM are dropped.
    pub fn load(&mut self, address: u64, bytes: &[u8]) {
        for (offset, &byte) in bytes.iter().enumerate() {
            self.write_byte(address.wrapping_add(offset as u64), byte);
        }
    }

    /// Whether [`TargetAdapter::halt`] was called since the last step.
    pub fn halt_requested(&self) -> bool {
        self.halt_requested
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn mask(&self) -> u64 {
        match self.config.register_width {
            8 => u64::MAX,
            width => (1u64 << (width * 8)) - 1,
        }
    }

    fn offset(&self, address: u64) -> Option<usize> {
        let offset = address.checked_sub(self.config.memory_base)?;
        let offset = usize::try_from(offset).ok()?;
        (offset < self.memory.len()).then_some(offset)
    }

    fn fetchable(&self, address: u64) -> bool {
        let last = address.saturating_add(self.config.instruction_width.saturating_sub(1));
        self.offset(address).is_some() && self.offset(last).is_some()
    }
}

impl TargetAdapter for FlatTarget {
    fn is_big_endian(&self) -> bool {
        self.config.big_endian
    }

    fn halt(&mut self) {
        self.halt_requested = true;
    }

    fn register_count(&self) -> usize {
        self.config.register_count
    }

    fn register_width(&self) -> usize {
        self.config.register_width
    }

    fn pc_register(&self) -> usize {
        self.config.pc_register
    }

    fn read_register(&self, index: usize) -> u64 {
        self.registers.get(index).copied().unwrap_or(0)
    }

    fn write_register(&mut self, index: usize, value: u64) {
        let mask = self.mask();
        if let Some(slot) = self.registers.get_mut(index) {
            *slot = value & mask;
        }
    }

    fn set_program_counter(&mut self, value: u64) {
        let pc = self.config.pc_register;
        self.write_register(pc, value);
    }

    fn read_byte(&self, address: u64) -> u8 {
        self.offset(address).map_or(0, |i| self.memory[i])
    }

    fn write_byte(&mut self, address: u64, byte: u8) {
        if let Some(i) = self.offset(address) {
            self.memory[i] = byte;
        }
    }

    fn step(&mut self) -> Result<Execution, AdapterFault> {
        self.halt_requested = false;
        let pc = self.program_counter();
        if self.config.exit_address == Some(pc) {
            trace!(pc, "flat target reached exit address");
            return Ok(Execution::Exited(0));
        }
        if !self.fetchable(pc) {
            return Err(AdapterFault::FetchOutOfBounds { address: pc });
        }
        self.set_program_counter(pc.wrapping_add(self.config.instruction_width));
        self.steps += 1;
        Ok(Execution::Executed)
    }
}
