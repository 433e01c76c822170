//! Renderers consume decoded telemetry.
//!
//! The connection handler calls [`Renderer::display`] once per decoded
//! record, in arrival order for that connection. Renderers are shared by
//! every connection, so they must be `Send + Sync`, and they are expected not
//! to block. Any error a renderer returns (or panic it raises) is logged by
//! the handler and never closes the connection.

pub mod channel;
pub mod console;

pub use channel::ChannelRenderer;
pub use console::{format_snapshot, ConsoleRenderer};

use crate::error::RenderError;
use crate::messaging::TelemetryRecord;

/// Displays one telemetry record.
///
/// Implementations validate the record themselves (usually through
/// [`TelemetryRecord::flight`]), which is where shape failures surface.
pub trait Renderer: Send + Sync {
    fn display(&self, record: &TelemetryRecord) -> Result<(), RenderError>;
}
