//! Connection to the telemetry server.

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{info, warn};

/// Reconnect policy shared by the initial connect and later reconnects.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Connects to `host:port`, trying up to `policy.attempts` times.
pub async fn connect_with_retry(host: &str, port: u16, policy: &RetryPolicy) -> Result<TcpStream> {
    for attempt in 1..=policy.attempts {
        match TcpStream::connect((host, port)).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }
                info!("Connected to server at {}:{}", host, port);
                return Ok(stream);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.attempts,
                    "Server connection attempt failed: {}",
                    e
                );
                if attempt < policy.attempts {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    bail!(
        "Could not connect to {}:{} after {} attempts",
        host,
        port,
        policy.attempts
    )
}
