pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{
    default_port, Config, LogConfig, LogLevel, MachineConfig, ServerConfig, SessionSettings,
    FALLBACK_PORT,
};
pub use error::ConfigError;
pub use load::{load_config, load_file, load_from_str, PROJECT_DIR};
