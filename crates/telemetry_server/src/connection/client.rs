//! Client connection representation.
//!
//! This module defines the state owned by one accepted telemetry producer:
//! its socket, its address and the framing buffer for its byte stream.

use super::decoder::FrameDecoder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// One accepted client connection.
///
/// Owned exclusively by its connection handler. Dropping it closes the socket
/// and discards any unterminated bytes still buffered.
///
/// The stream type is generic so handlers can be driven by in-memory pipes in
/// tests; production connections use [`TcpStream`].
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    /// The client socket
    pub(crate) stream: S,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was accepted
    pub connected_at: Instant,

    /// Partial frame data carried between reads
    pub(crate) decoder: FrameDecoder,
}

impl<S> Connection<S> {
    pub fn new(stream: S, remote_addr: SocketAddr) -> Self {
        Self {
            stream,
            remote_addr,
            connected_at: Instant::now(),
            decoder: FrameDecoder::new(),
        }
    }

    /// How long the connection has been open.
    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Bytes received after the last complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.decoder.len()
    }
}
