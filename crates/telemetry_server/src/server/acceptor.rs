//! Listening sockets and accept loop.

use crate::config::ServerConfig;
use crate::connection::{handle_connection, Connection, HandlerSettings};
use crate::error::ServerError;
use crate::render::Renderer;
use crate::server::ServerState;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::{poll_fn, Future};
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// A source of accepted client streams.
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// Waits for the next client. An `Err` is treated as transient.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

/// Every address a host name resolved to, bound on one shared port.
///
/// `localhost` commonly resolves to both `::1` and `127.0.0.1`; producers may
/// connect over either family, so each resolved address gets its own socket.
#[derive(Debug)]
pub struct TcpListeners {
    listeners: Vec<TcpListener>,
    local_addrs: Vec<SocketAddr>,
    next: usize,
}

impl TcpListeners {
    /// Resolves the configured host and listens on every address it yields.
    ///
    /// A candidate whose address family the host cannot serve is skipped with
    /// a warning. A port conflict on any candidate is fatal, as is ending up
    /// with no listener at all.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let address = config.listen_address();
        let resolved = lookup_host((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::AddressResolution {
                address: address.clone(),
                source,
            })?;

        let mut candidates: Vec<SocketAddr> = Vec::new();
        for candidate in resolved {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        let mut listeners = Vec::new();
        let mut local_addrs: Vec<SocketAddr> = Vec::new();
        let mut last_error = None;

        for mut candidate in candidates {
            // An ephemeral port picked by the first bind is shared by the rest.
            if candidate.port() == 0 {
                if let Some(first) = local_addrs.first() {
                    candidate.set_port(first.port());
                }
            }

            match bind_socket(candidate, config.backlog) {
                Ok(listener) => {
                    let local = listener.local_addr().map_err(|e| {
                        ServerError::Network(format!("Failed to read local address: {e}"))
                    })?;
                    listeners.push(listener);
                    local_addrs.push(local);
                }
                Err(e) if config.port != 0 && is_port_conflict(&e) => return Err(e),
                Err(e) => {
                    warn!("Socket binding failed on {}: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        if listeners.is_empty() {
            return Err(last_error.unwrap_or_else(|| ServerError::AddressResolution {
                address,
                source: io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"),
            }));
        }

        Ok(Self {
            listeners,
            local_addrs,
            next: 0,
        })
    }

    /// Bound addresses, in resolution order. Never empty.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// Polls each socket once, starting after the one that accepted last so
    /// a busy family cannot starve the others.
    fn poll_accept(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<(TcpStream, SocketAddr)>> {
        let count = self.listeners.len();
        for offset in 0..count {
            let index = (self.next + offset) % count;
            if let Poll::Ready(result) = self.listeners[index].poll_accept(cx) {
                self.next = (index + 1) % count;
                return Poll::Ready(result);
            }
        }
        Poll::Pending
    }
}

impl Listener for TcpListeners {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        poll_fn(move |cx| self.poll_accept(cx))
    }
}

/// Owns the listener and spawns one handler task per client.
///
/// Created by [`ConnectionAcceptor::bind`] (or
/// [`with_listener`](Self::with_listener)); [`run`](Self::run) consumes it and
/// returns once shutdown is requested, closing the listener on the way out.
pub struct ConnectionAcceptor<L: Listener = TcpListeners> {
    listener: L,
    state: Arc<ServerState>,
    renderer: Arc<dyn Renderer>,
    settings: HandlerSettings,
    accept_backoff: Duration,
    shutdown_receiver: broadcast::Receiver<()>,
}

impl ConnectionAcceptor<TcpListeners> {
    /// Resolves, binds and listens on the configured address.
    ///
    /// Every failure here is a startup failure: the caller must not carry on
    /// without a listener.
    pub async fn bind(
        config: &ServerConfig,
        state: Arc<ServerState>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListeners::bind(config).await?;
        for addr in listener.local_addrs() {
            info!("Server started on {}", addr);
        }

        Ok(Self::with_listener(listener, config, state, renderer))
    }

    /// The first address actually bound, useful when the configured port was `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addrs[0]
    }

    /// Every bound address. All of them share one port.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        self.listener.local_addrs()
    }
}

impl<L: Listener> ConnectionAcceptor<L> {
    /// Wraps an already listening source.
    pub fn with_listener(
        listener: L,
        config: &ServerConfig,
        state: Arc<ServerState>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        // A shutdown that lands before this point is seen through the flag.
        let shutdown_receiver = state.subscribe_shutdown();

        Self {
            listener,
            state,
            renderer,
            settings: HandlerSettings::from(config),
            accept_backoff: config.accept_backoff,
            shutdown_receiver,
        }
    }

    /// Accepts connections until shutdown is requested.
    ///
    /// A failed `accept` is logged and retried after the configured backoff,
    /// indefinitely. Handlers already running are left alone when this returns.
    pub async fn run(mut self) {
        info!("Waiting for connections...");

        while self.state.is_running() {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown_receiver.recv() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.spawn_handler(stream, peer),
                Err(e) => {
                    error!(
                        error = %e,
                        "Error accepting connection, retrying in {:?}",
                        self.accept_backoff
                    );
                    tokio::select! {
                        biased;
                        _ = self.shutdown_receiver.recv() => break,
                        _ = sleep(self.accept_backoff) => {}
                    }
                }
            }
        }

        info!(
            active = self.state.active_connections(),
            "Listener closed"
        );
    }

    fn spawn_handler(&self, stream: L::Stream, peer: SocketAddr) {
        let guard = self.state.track_connection();
        info!(
            peer = %peer,
            active = self.state.active_connections(),
            "New connection from {}",
            peer
        );

        let state = Arc::clone(&self.state);
        let renderer = Arc::clone(&self.renderer);
        let settings = self.settings.clone();

        tokio::spawn(async move {
            let _guard = guard;
            let connection = Connection::new(stream, peer);
            handle_connection(connection, &state, renderer.as_ref(), &settings).await;
        });
    }
}

/// Whether the port itself is unusable, as opposed to the address family.
fn is_port_conflict(error: &ServerError) -> bool {
    match error {
        ServerError::Bind { source, .. } | ServerError::Listen { source, .. } => matches!(
            source.kind(),
            io::ErrorKind::AddrInUse | io::ErrorKind::PermissionDenied
        ),
        _ => false,
    }
}

fn bind_socket(addr: SocketAddr, backlog: i32) -> Result<TcpListener, ServerError> {
    let address = addr.to_string();
    let bind_error = |source| ServerError::Bind {
        address: address.clone(),
        source,
    };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_error)?;
    if let Err(e) = socket.set_reuse_address(true) {
        warn!("Failed to set SO_REUSEADDR on {}: {}", addr, e);
    }
    // Keep v6 sockets off the v4 port so both families can bind side by side.
    if addr.is_ipv6() {
        socket.set_only_v6(true).map_err(bind_error)?;
    }
    socket.bind(&addr.into()).map_err(bind_error)?;

    socket.listen(backlog).map_err(|source| ServerError::Listen {
        address: address.clone(),
        source,
    })?;
    socket.set_nonblocking(true).map_err(|source| ServerError::Listen {
        address: address.clone(),
        source,
    })?;

    let std_listener: StdTcpListener = socket.into();
    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ChannelRenderer;
    use std::collections::VecDeque;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    const GUIDED: &str = r#"{"liveFlightDashboard":{"currentFlight":{"flightMode":"GUIDED","flightStatus":{"status":"In Air","location":{"latitude":-35.363261,"longitude":149.165230},"altitude":50.0},"battery":{"level":100}}}}"#;

    /// Replays a fixed sequence of accept results, then waits forever.
    struct ScriptedListener {
        script: VecDeque<io::Result<(DuplexStream, SocketAddr)>>,
    }

    impl ScriptedListener {
        fn new(script: Vec<io::Result<(DuplexStream, SocketAddr)>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl Listener for ScriptedListener {
        type Stream = DuplexStream;

        fn accept(
            &mut self,
        ) -> impl Future<Output = io::Result<(DuplexStream, SocketAddr)>> + Send {
            let next = self.script.pop_front();
            async move {
                match next {
                    Some(result) => result,
                    None => std::future::pending().await,
                }
            }
        }
    }

    fn config_with_backoff(backoff: Duration) -> ServerConfig {
        let mut config = ServerConfig::new("127.0.0.1", 0);
        config.accept_backoff = backoff;
        config
    }

    #[tokio::test]
    async fn test_accept_errors_are_retried() {
        let (mut client, server_side) = duplex(1024);
        let peer: SocketAddr = "10.0.0.7:40000".parse().unwrap();
        let listener = ScriptedListener::new(vec![
            Err(io::Error::new(io::ErrorKind::Other, "too many open files")),
            Err(io::Error::from(io::ErrorKind::ConnectionAborted)),
            Ok((server_side, peer)),
        ]);

        let state = Arc::new(ServerState::new());
        let (renderer, mut records) = ChannelRenderer::new();
        let acceptor = ConnectionAcceptor::with_listener(
            listener,
            &config_with_backoff(Duration::from_millis(10)),
            Arc::clone(&state),
            Arc::new(renderer),
        );
        let accept_loop = tokio::spawn(acceptor.run());

        client.write_all(format!("{GUIDED}\n").as_bytes()).await.unwrap();
        let record = timeout(Duration::from_secs(2), records.recv())
            .await
            .expect("client accepted after errors was never rendered")
            .unwrap();
        assert_eq!(record.source(), Some(peer));
        assert!(!accept_loop.is_finished());

        state.request_shutdown();
        timeout(Duration::from_secs(2), accept_loop)
            .await
            .expect("accept loop did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_accept_backoff() {
        let listener = ScriptedListener::new(vec![Err(io::Error::from(
            io::ErrorKind::ConnectionReset,
        ))]);

        let state = Arc::new(ServerState::new());
        let (renderer, _records) = ChannelRenderer::new();
        let acceptor = ConnectionAcceptor::with_listener(
            listener,
            &config_with_backoff(Duration::from_secs(60)),
            Arc::clone(&state),
            Arc::new(renderer),
        );
        let accept_loop = tokio::spawn(acceptor.run());

        // Let the loop hit the error and start sleeping.
        sleep(Duration::from_millis(50)).await;
        assert!(!accept_loop.is_finished());

        state.request_shutdown();
        timeout(Duration::from_secs(1), accept_loop)
            .await
            .expect("backoff sleep was not interrupted by shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_localhost_binds_every_usable_family() {
        let (renderer, _records) = ChannelRenderer::new();
        let acceptor = ConnectionAcceptor::bind(
            &ServerConfig::new("localhost", 0),
            Arc::new(ServerState::new()),
            Arc::new(renderer),
        )
        .await
        .unwrap();

        let bound = acceptor.local_addrs();
        let port = acceptor.local_addr().port();
        assert!(bound.iter().all(|addr| addr.port() == port));

        for resolved in lookup_host(("localhost", 0)).await.unwrap() {
            // Hosts without IPv6 still list ::1; only families that can bind count.
            if StdTcpListener::bind((resolved.ip(), 0)).is_ok() {
                assert!(
                    bound.iter().any(|addr| addr.ip() == resolved.ip()),
                    "{} resolved but not bound (bound: {:?})",
                    resolved.ip(),
                    bound
                );
            }
        }
    }

    #[test]
    fn test_port_conflict_classification() {
        let in_use = ServerError::Bind {
            address: "127.0.0.1:5760".to_string(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        let unavailable = ServerError::Bind {
            address: "[::1]:5760".to_string(),
            source: io::Error::from(io::ErrorKind::AddrNotAvailable),
        };

        assert!(is_port_conflict(&in_use));
        assert!(!is_port_conflict(&unavailable));
    }
}
