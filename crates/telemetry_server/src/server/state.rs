//! Shared running state for the accept loop and every connection handler.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Process-wide running flag plus the shutdown wake-up channel.
///
/// The flag starts `true`, is cleared exactly once by
/// [`request_shutdown`](Self::request_shutdown) and is never set again.
/// Handlers poll it between reads; the accept loop additionally waits on the
/// broadcast so it wakes up without needing another connection.
#[derive(Debug)]
pub struct ServerState {
    running: AtomicBool,
    shutdown_sender: broadcast::Sender<()>,
    active_connections: AtomicUsize,
}

impl ServerState {
    pub fn new() -> Self {
        let (shutdown_sender, _) = broadcast::channel(1);
        Self {
            running: AtomicBool::new(true),
            shutdown_sender,
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Clears the running flag and wakes the accept loop.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn request_shutdown(&self) -> bool {
        let flipped = self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if flipped {
            // No receiver just means no accept loop is running yet.
            let _ = self.shutdown_sender.send(());
        }
        flipped
    }

    /// Receiver notified when shutdown is requested.
    ///
    /// Subscribe before checking [`is_running`](Self::is_running) to avoid
    /// missing a shutdown that lands in between.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_sender.subscribe()
    }

    /// Number of connection handlers currently alive.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Counts a connection as active until the returned guard is dropped.
    pub fn track_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            state: Arc::clone(self),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the active connection count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
