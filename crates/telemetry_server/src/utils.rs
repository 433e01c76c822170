//! Convenience constructors for the telemetry server.

use crate::config::ServerConfig;
use crate::render::{ConsoleRenderer, Renderer};
use crate::server::TelemetryServer;
use std::sync::Arc;

/// Creates a server on the default address (`localhost:5760`).
pub fn create_server(renderer: Arc<dyn Renderer>) -> TelemetryServer {
    TelemetryServer::new(ServerConfig::default(), renderer)
}

/// Creates a server that prints every telemetry block to stdout.
pub fn create_console_server(config: ServerConfig) -> TelemetryServer {
    TelemetryServer::new(config, Arc::new(ConsoleRenderer::stdout()))
}
