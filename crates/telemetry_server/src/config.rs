//! Server configuration types and defaults.
//!
//! This module contains the configuration structure used to initialize the
//! telemetry server. The operator binary builds it from its TOML file; tests
//! build it directly (usually with port `0` for an ephemeral port).

use std::time::Duration;

/// Default host the server listens on.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 5760;

/// Default number of bytes requested per socket read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Configuration structure for the telemetry server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or IP address to bind to. Host names are resolved at bind time.
    pub host: String,

    /// TCP port to bind to. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Listen backlog passed to `listen(2)`
    pub backlog: i32,

    /// Upper bound on bytes read from a client socket in one call
    pub read_chunk_size: usize,

    /// Pause before retrying after a failed `accept`
    pub accept_backoff: Duration,

    /// Optional limit on how long a handler waits for the next chunk.
    /// `None` waits forever.
    pub read_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Creates a configuration for `host:port` with all other values defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// The `host:port` string used in log lines and error messages.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backlog: 5,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            accept_backoff: Duration::from_secs(1),
            read_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5760);
        assert_eq!(config.read_chunk_size, 4096);
        assert_eq!(config.accept_backoff, Duration::from_secs(1));
        assert!(config.read_timeout.is_none());
        assert_eq!(config.listen_address(), "localhost:5760");
    }

    #[test]
    fn test_new_keeps_defaults() {
        let config = ServerConfig::new("127.0.0.1", 0);
        assert_eq!(config.listen_address(), "127.0.0.1:0");
        assert_eq!(config.backlog, 5);
    }
}
