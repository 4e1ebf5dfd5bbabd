use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Port used when the build does not bake in another one.
pub const FALLBACK_PORT: u16 = 5000;

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Every packet and every instruction-level event.
    Trace,
    /// One line per packet.
    Debug,
    /// Connections and lifecycle (default).
    #[default]
    Info,
    /// Faults and dropped sessions only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Halt the target when a debugger attaches.
    #[serde(default = "default_true")]
    pub halt_on_attach: bool,
}

/// The compiled-in default port; `SIMSTUB_PORT` at build time overrides it.
pub fn default_port() -> u16 {
    option_env!("SIMSTUB_PORT")
        .and_then(|port| port.parse().ok())
        .unwrap_or(FALLBACK_PORT)
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            halt_on_attach: true,
        }
    }
}

/// Per-session protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Largest packet payload, advertised to the debugger (64–65536).
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    /// NAKs tolerated for one frame before the session is dropped.
    #[serde(default = "default_max_retransmits")]
    pub max_retransmits: u32,
    /// Consecutive corrupt frames tolerated before the session is dropped.
    #[serde(default = "default_max_framing_errors")]
    pub max_framing_errors: u32,
    /// Run-length compress replies.
    #[serde(default)]
    pub compress_replies: bool,
}

fn default_max_packet_size() -> usize {
    4096
}
fn default_max_retransmits() -> u32 {
    5
}
fn default_max_framing_errors() -> u32 {
    10
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_packet_size: default_max_packet_size(),
            max_retransmits: default_max_retransmits(),
            max_framing_errors: default_max_framing_errors(),
            compress_replies: false,
        }
    }
}

/// Geometry of the built-in reference machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Registers in the debugger's register packet.
    #[serde(default = "default_registers")]
    pub registers: usize,
    /// Register width in bytes (1–8).
    #[serde(default = "default_width")]
    pub register_width: usize,
    /// Index of the program counter.
    #[serde(default = "default_pc_register")]
    pub pc_register: usize,
    /// Serialize registers most-significant byte first.
    #[serde(default)]
    pub big_endian: bool,
    /// First address of RAM.
    #[serde(default)]
    pub memory_base: u64,
    /// RAM size in bytes.
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
    /// Bytes the program counter advances per instruction.
    #[serde(default = "default_instruction_width")]
    pub instruction_width: u64,
    /// Reaching this address ends the program.
    #[serde(default)]
    pub exit_address: Option<u64>,
    /// Raw binary loaded into RAM at start-up.
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Where `image` is loaded; defaults to `memory_base`.
    #[serde(default)]
    pub load_address: Option<u64>,
}

fn default_registers() -> usize {
    33
}
fn default_width() -> usize {
    4
}
fn default_pc_register() -> usize {
    32
}
fn default_memory_size() -> usize {
    64 * 1024
}
fn default_instruction_width() -> u64 {
    4
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            registers: default_registers(),
            register_width: default_width(),
            pc_register: default_pc_register(),
            big_endian: false,
            memory_base: 0,
            memory_size: default_memory_size(),
            instruction_width: default_instruction_width(),
            exit_address: None,
            image: None,
            load_address: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file; stderr otherwise.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Top-level simstub configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Protocol settings.
    #[serde(default)]
    pub session: SessionSettings,
    /// Reference machine.
    #[serde(default)]
    pub machine: MachineConfig,
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}
