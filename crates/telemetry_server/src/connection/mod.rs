//! Client connections: framing, per-connection state and the read loop.

pub mod client;
pub mod decoder;
pub mod handler;

pub use client::Connection;
pub use decoder::{FrameDecoder, FRAME_DELIMITER};
pub use handler::{
    handle_connection, CloseReason, ConnectionStats, ConnectionSummary, HandlerSettings,
};
