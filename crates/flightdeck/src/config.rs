//! Configuration management for the flightdeck console.
//!
//! Settings come from a TOML file which is created with defaults on first
//! run. Command-line overrides are applied on top, then the result is
//! validated and converted into a [`ServerConfig`].

use crate::cli::CliArgs;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use telemetry_server::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_CHUNK_SIZE};
use telemetry_server::ServerConfig;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_backlog() -> i32 {
    5
}

fn default_read_chunk_size() -> usize {
    DEFAULT_READ_CHUNK_SIZE
}

fn default_accept_backoff_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listener configuration.
///
/// Every field has a default so a partial `[server]` table is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host name or IP literal to listen on
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen queue length
    #[serde(default = "default_backlog")]
    pub backlog: i32,
    /// Upper bound on bytes taken per socket read
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Pause after a failed accept, in milliseconds
    #[serde(default = "default_accept_backoff_ms")]
    pub accept_backoff_ms: u64,
    /// Idle read timeout in seconds (0 disables it)
    #[serde(default)]
    pub read_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            read_chunk_size: default_read_chunk_size(),
            accept_backoff_ms: default_accept_backoff_ms(),
            read_timeout_secs: 0,
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Checks the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.trim().is_empty() {
            return Err("Listen host cannot be empty".to_string());
        }

        if self.server.port == 0 {
            return Err("Listen port must be between 1 and 65535".to_string());
        }

        if self.server.backlog <= 0 {
            return Err("Listen backlog must be greater than zero".to_string());
        }

        if self.server.read_chunk_size == 0 {
            return Err("read_chunk_size must be greater than zero".to_string());
        }

        if self.server.accept_backoff_ms == 0 {
            return Err("accept_backoff_ms must be greater than zero".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    /// Converts to the library's listener configuration.
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            backlog: self.server.backlog,
            read_chunk_size: self.server.read_chunk_size,
            accept_backoff: Duration::from_millis(self.server.accept_backoff_ms),
            read_timeout: match self.server.read_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 5760);
        assert_eq!(config.server.backlog, 5);
        assert_eq!(config.server.read_chunk_size, 4096);
        assert_eq!(config.server.accept_backoff_ms, 1000);
        assert_eq!(config.server.read_timeout_secs, 0);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flightdeck.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.port, 5760);
        assert!(path.exists());

        // The written file loads back to the same settings.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.host, config.server.host);
        assert_eq!(reloaded.logging.level, config.logging.level);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
host = "0.0.0.0"
port = 14550
backlog = 64
read_chunk_size = 1024
accept_backoff_ms = 250
read_timeout_secs = 30

[logging]
level = "debug"
json_format = true
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 14550);
        assert_eq!(config.server.backlog, 64);
        assert_eq!(config.server.read_chunk_size, 1024);
        assert_eq!(config.server.accept_backoff_ms, 250);
        assert_eq!(config.server.read_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server]\nport = 6000\n")
            .await
            .unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.read_chunk_size, 4096);
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[server\nport = ").await.unwrap();

        assert!(AppConfig::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs::try_parse_from([
            "flightdeck",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--log-level",
            "warn",
            "--json-logs",
        ])
        .unwrap();

        config.apply_cli(&args);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_cli_without_overrides_keeps_file_values() {
        let mut config = AppConfig::default();
        config.server.port = 7000;
        let args = CliArgs::try_parse_from(["flightdeck"]).unwrap();

        config.apply_cli(&args);
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "localhost");
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.server.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.read_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.accept_backoff_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("verbose"));
    }

    #[test]
    fn test_to_server_config() {
        let mut config = AppConfig::default();
        let server = config.to_server_config();
        assert_eq!(server.listen_address(), "localhost:5760");
        assert_eq!(server.accept_backoff, Duration::from_secs(1));
        assert!(server.read_timeout.is_none());

        config.server.read_timeout_secs = 15;
        let server = config.to_server_config();
        assert_eq!(server.read_timeout, Some(Duration::from_secs(15)));
    }
}
