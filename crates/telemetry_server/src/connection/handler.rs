//! Per-connection read loop.
//!
//! A handler owns one [`Connection`] from accept to close. It reads bounded
//! chunks, splits them into frames, decodes each frame and passes the record
//! to the renderer. Everything that can go wrong with a single frame is
//! logged and skipped here; only the socket itself (EOF, read error, read
//! timeout) or server shutdown ends the loop.

use super::client::Connection;
use crate::config::{ServerConfig, DEFAULT_READ_CHUNK_SIZE};
use crate::error::RenderError;
use crate::messaging::TelemetryRecord;
use crate::render::Renderer;
use crate::server::ServerState;
use std::io;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Read-loop settings taken from [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub read_chunk_size: usize,
    pub read_timeout: Option<Duration>,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout: None,
        }
    }
}

impl From<&ServerConfig> for HandlerSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_chunk_size: config.read_chunk_size,
            read_timeout: config.read_timeout,
        }
    }
}

/// Why a handler stopped reading.
#[derive(Debug)]
pub enum CloseReason {
    /// The client closed its end (zero-length read).
    Disconnected,
    /// The socket returned an error.
    ReadFailed(io::Error),
    /// No bytes arrived within the configured read timeout.
    TimedOut(Duration),
    /// The server stopped running before the next read.
    ServerStopped,
}

/// Per-connection frame counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub frames_received: u64,
    pub records_rendered: u64,
    pub invalid_frames: u64,
    pub render_failures: u64,
}

#[derive(Debug)]
pub struct ConnectionSummary {
    pub reason: CloseReason,
    pub stats: ConnectionStats,
}

/// Drives one connection until it disconnects, fails, times out or the
/// server stops.
///
/// The connection is dropped (closing the socket) before this returns, on
/// every path.
pub async fn handle_connection<S>(
    mut connection: Connection<S>,
    state: &ServerState,
    renderer: &dyn Renderer,
    settings: &HandlerSettings,
) -> ConnectionSummary
where
    S: AsyncRead + Unpin,
{
    let peer = connection.remote_addr;
    let mut stats = ConnectionStats::default();
    let mut chunk = vec![0u8; settings.read_chunk_size.max(1)];

    let reason = loop {
        if !state.is_running() {
            break CloseReason::ServerStopped;
        }

        let read = match settings.read_timeout {
            Some(limit) => match timeout(limit, connection.stream.read(&mut chunk)).await {
                Ok(result) => result,
                Err(_) => break CloseReason::TimedOut(limit),
            },
            None => connection.stream.read(&mut chunk).await,
        };

        let len = match read {
            Ok(0) => break CloseReason::Disconnected,
            Ok(len) => len,
            Err(e) => break CloseReason::ReadFailed(e),
        };

        for frame in connection.decoder.feed(&chunk[..len]) {
            stats.frames_received += 1;
            dispatch_frame(&frame, peer, renderer, &mut stats);
        }
    };

    match &reason {
        CloseReason::Disconnected => info!(peer = %peer, "Client {} disconnected", peer),
        CloseReason::ReadFailed(e) => warn!(peer = %peer, error = %e, "Error handling client {}", peer),
        CloseReason::TimedOut(limit) => {
            warn!(peer = %peer, "No data from {} for {:?}, closing", peer, limit)
        }
        CloseReason::ServerStopped => debug!(peer = %peer, "Server stopping, leaving read loop"),
    }

    if !connection.decoder.is_empty() {
        debug!(
            peer = %peer,
            bytes = connection.pending_bytes(),
            "Discarding unterminated trailing data"
        );
    }
    let uptime = connection.uptime();
    drop(connection);

    info!(
        peer = %peer,
        frames = stats.frames_received,
        rendered = stats.records_rendered,
        invalid = stats.invalid_frames,
        render_failures = stats.render_failures,
        uptime_ms = uptime.as_millis() as u64,
        "Connection closed for {}",
        peer
    );

    ConnectionSummary { reason, stats }
}

/// Decodes one frame and hands it to the renderer, containing every failure.
fn dispatch_frame(
    frame: &[u8],
    peer: SocketAddr,
    renderer: &dyn Renderer,
    stats: &mut ConnectionStats,
) {
    let record = match TelemetryRecord::decode(frame) {
        Ok(record) => record.with_source(peer),
        Err(e) => {
            stats.invalid_frames += 1;
            warn!(peer = %peer, len = frame.len(), error = %e, "Invalid JSON received");
            return;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| renderer.display(&record))) {
        Ok(Ok(())) => stats.records_rendered += 1,
        Ok(Err(RenderError::Telemetry(e))) => {
            stats.render_failures += 1;
            warn!(
                peer = %peer,
                field = e.field_path().unwrap_or_default(),
                "Error parsing telemetry: {}",
                e
            );
        }
        Ok(Err(e)) => {
            stats.render_failures += 1;
            warn!(peer = %peer, error = %e, "Renderer failed");
        }
        Err(_) => {
            stats.render_failures += 1;
            error!(peer = %peer, "Renderer panicked while displaying telemetry");
        }
    }
}
