//! Listener options.

use simstub_rsp::SessionConfig;

/// Port used when the caller does not pick one.
pub const DEFAULT_PORT: u16 = 5000;

/// Where to listen and how to run each session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Interface to bind.
    pub bind_address: String,
    /// TCP port; `0` picks an ephemeral port.
    pub port: u16,
    /// Settings applied to every debugger session.
    pub session: SessionConfig,
}

impl ServerOptions {
    /// `bind_address:port`, bracketing IPv6 literals.
    pub fn socket_address(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            session: SessionConfig::default(),
        }
    }
}
