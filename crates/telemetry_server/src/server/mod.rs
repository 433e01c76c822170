//! Server module containing the accept loop and shared running state.

pub mod acceptor;
pub mod core;
pub mod state;

pub use acceptor::{ConnectionAcceptor, Listener, TcpListeners};
pub use self::core::TelemetryServer;
pub use state::{ConnectionGuard, ServerState};
