//! Channel-backed renderer for embedding the server in another task.

use super::Renderer;
use crate::error::RenderError;
use crate::messaging::TelemetryRecord;
use tokio::sync::mpsc;

/// Forwards every well-shaped record to an unbounded channel.
///
/// Records failing validation are rejected with [`RenderError::Telemetry`]
/// and never reach the receiver. Sending does not block.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    sender: mpsc::UnboundedSender<TelemetryRecord>,
}

impl ChannelRenderer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TelemetryRecord>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Renderer for ChannelRenderer {
    fn display(&self, record: &TelemetryRecord) -> Result<(), RenderError> {
        record.flight()?;
        self.sender
            .send(record.clone())
            .map_err(|_| RenderError::Closed)
    }
}
