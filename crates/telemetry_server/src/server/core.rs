//! Core telemetry server implementation.
//!
//! [`TelemetryServer`] ties together configuration, the shared running state
//! and the renderer, and hands them to a [`ConnectionAcceptor`] when started.

use super::acceptor::ConnectionAcceptor;
use super::state::ServerState;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::render::Renderer;
use std::sync::Arc;
use tracing::info;

/// The telemetry ingestion server.
///
/// # Lifecycle
///
/// 1. [`bind`](Self::bind) (or [`start`](Self::start)) creates the listener.
///    Failure here is fatal.
/// 2. The acceptor loop spawns one independent task per client.
/// 3. [`shutdown`](Self::shutdown) clears the running flag and closes the
///    listener. Connected clients are not cut off; each handler leaves its
///    loop after its next read.
pub struct TelemetryServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Running flag shared with the acceptor and every handler
    state: Arc<ServerState>,

    /// Where decoded telemetry goes
    renderer: Arc<dyn Renderer>,
}

impl TelemetryServer {
    pub fn new(config: ServerConfig, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            config,
            state: Arc::new(ServerState::new()),
            renderer,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Binds the listening socket without starting the accept loop.
    pub async fn bind(&self) -> Result<ConnectionAcceptor, ServerError> {
        if self.config.read_chunk_size == 0 {
            return Err(ServerError::Config(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }

        ConnectionAcceptor::bind(
            &self.config,
            Arc::clone(&self.state),
            Arc::clone(&self.renderer),
        )
        .await
    }

    /// Binds and accepts connections until [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<(), ServerError> {
        let acceptor = self.bind().await?;
        acceptor.run().await;
        info!("Server stopped");
        Ok(())
    }

    /// Requests shutdown. Only the first call has any effect.
    pub fn shutdown(&self) {
        if self.state.request_shutdown() {
            info!("Server shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChannelRenderer;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_zero_chunk_size_is_rejected() {
        let (renderer, _records) = ChannelRenderer::new();
        let mut config = ServerConfig::new("127.0.0.1", 0);
        config.read_chunk_size = 0;

        let server = TelemetryServer::new(config, Arc::new(renderer));
        assert!(matches!(server.bind().await, Err(ServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_start_returns_after_shutdown() {
        let (renderer, _records) = ChannelRenderer::new();
        let server = Arc::new(TelemetryServer::new(
            ServerConfig::new("127.0.0.1", 0),
            Arc::new(renderer),
        ));

        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.start().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(result.is_ok());
        assert!(!server.state().is_running());
    }
}
