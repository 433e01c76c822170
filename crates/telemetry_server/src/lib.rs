//! # Telemetry Server
//!
//! Ingests flight telemetry from remote vehicle simulators over TCP and hands
//! every update to a renderer.
//!
//! ## Wire Protocol
//!
//! Clients open a TCP connection and write UTF-8 JSON objects, each followed
//! by a single `\n`. There is no length prefix, handshake or version
//! negotiation. The server only ever reads.
//!
//! ```text
//! {"liveFlightDashboard":{"currentFlight":{"flightMode":"GUIDED", ...}}}\n
//! {"liveFlightDashboard":{"currentFlight":{"flightMode":"GUIDED", ...}}}\n
//! ```
//!
//! ## Message Flow
//!
//! 1. [`ConnectionAcceptor`] accepts a client and spawns a task for it
//! 2. The handler reads bounded chunks into the connection's [`FrameDecoder`]
//! 3. Each complete frame is parsed into a [`TelemetryRecord`]
//! 4. The record goes to the [`Renderer`], which validates and displays it
//!
//! ## Error Isolation
//!
//! Per-frame failures (bad JSON, missing fields, renderer errors or panics)
//! are logged and skipped. Socket failures end only that client's task.
//! Only a failure to bind the listener ([`ServerError`]) reaches the caller.
//!
//! ## Shutdown
//!
//! [`TelemetryServer::shutdown`] clears the shared [`ServerState`] flag and
//! closes the listener. Handlers notice the flag after their next read; they
//! are never forcibly disconnected.

pub use config::ServerConfig;
pub use connection::{Connection, FrameDecoder};
pub use error::{DecodeError, RenderError, ServerError};
pub use messaging::{Attitude, FlightSnapshot, TelemetryRecord};
pub use render::{ChannelRenderer, ConsoleRenderer, Renderer};
pub use server::{ConnectionAcceptor, Listener, ServerState, TcpListeners, TelemetryServer};
pub use utils::{create_console_server, create_server};

pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod render;
pub mod server;
pub mod utils;
