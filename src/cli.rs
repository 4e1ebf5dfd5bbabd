use std::path::PathBuf;

use clap::{ArgAction, Parser};
use simstub_config::{Config, LogLevel};

/// GDB remote stub for simulated processors.
#[derive(Debug, Parser)]
#[command(name = "simstub", version, about)]
pub(crate) struct Cli {
    /// TCP port to listen on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Interface to bind.
    #[arg(long, value_name = "ADDRESS")]
    pub bind: Option<String>,

    /// Read configuration from DIR instead of the per-user directory.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Use only this config file, ignoring the global and project ones.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Leave the target running when a debugger attaches.
    #[arg(long)]
    pub no_halt_on_attach: bool,

    /// Run-length compress replies.
    #[arg(long)]
    pub compress: bool,

    /// Registers exposed by the reference machine.
    #[arg(long)]
    pub registers: Option<usize>,

    /// Register width in bytes.
    #[arg(long, value_name = "BYTES")]
    pub register_width: Option<usize>,

    /// Index of the program counter register.
    #[arg(long, value_name = "INDEX")]
    pub pc_register: Option<usize>,

    /// Serialize registers big-endian.
    #[arg(long)]
    pub big_endian: bool,

    /// First address of RAM.
    #[arg(long, value_parser = parse_address)]
    pub memory_base: Option<u64>,

    /// RAM size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub memory_size: Option<usize>,

    /// Reaching this address ends the program.
    #[arg(long, value_parser = parse_address)]
    pub exit_address: Option<u64>,

    /// Raw binary to load into RAM.
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Load address for --image (defaults to the memory base).
    #[arg(long, value_parser = parse_address)]
    pub load_address: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Overlay command-line options on the loaded configuration.
    pub(crate) fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if self.no_halt_on_attach {
            config.server.halt_on_attach = false;
        }
        if self.compress {
            config.session.compress_replies = true;
        }

        let machine = &mut config.machine;
        if let Some(registers) = self.registers {
            machine.registers = registers;
        }
        if let Some(width) = self.register_width {
            machine.register_width = width;
        }
        if let Some(pc) = self.pc_register {
            machine.pc_register = pc;
        }
        if self.big_endian {
            machine.big_endian = true;
        }
        if let Some(base) = self.memory_base {
            machine.memory_base = base;
        }
        if let Some(size) = self.memory_size {
            machine.memory_size = size;
        }
        if self.exit_address.is_some() {
            machine.exit_address = self.exit_address;
        }
        if self.image.is_some() {
            machine.image = self.image.clone();
        }
        if self.load_address.is_some() {
            machine.load_address = self.load_address;
        }

        match self.verbose {
            0 => {}
            1 => config.log.level = LogLevel::Debug,
            _ => config.log.level = LogLevel::Trace,
        }
    }
}

/// Accepts `0x`-prefixed hex or plain decimal.
fn parse_address(text: &str) -> Result<u64, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address `{text}`: {e}"))
}
