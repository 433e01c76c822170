//! Newline framing for the telemetry byte stream.
//!
//! TCP delivers bytes with no regard for message boundaries, so a single read
//! may contain half a message, several messages, or a delimiter on its own.
//! [`FrameDecoder`] accumulates bytes and hands back every complete frame.

/// Byte that terminates every frame on the wire.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Splits an arbitrarily chunked byte stream into newline-delimited frames.
///
/// Frames are returned without their delimiter, in the order their delimiters
/// arrived. Bytes after the last delimiter stay buffered until a later call
/// completes them. After every call to [`feed`](Self::feed) the buffer holds
/// no delimiter.
///
/// An empty frame (two consecutive delimiters) is returned as a zero-length
/// frame; rejecting it is the decode stage's job.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        if chunk.is_empty() {
            return Vec::new();
        }

        // The buffered tail holds no delimiter, so only the new bytes need scanning.
        let mut cursor = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[cursor..]
            .iter()
            .position(|&byte| byte == FRAME_DELIMITER)
        {
            let end = cursor + offset;
            frames.push(self.buffer[start..end].to_vec());
            start = end + 1;
            cursor = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        frames
    }

    /// Bytes received after the last delimiter.
    pub fn remainder(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
