//! Error types for the telemetry server.
//!
//! Failures fall into three families:
//!
//! * [`ServerError`] - startup failures (address resolution, bind, listen).
//!   These are fatal; the process must not keep running without a listener.
//! * [`DecodeError`] - a single frame could not be turned into telemetry,
//!   either because it is not JSON or because the JSON has the wrong shape.
//! * [`RenderError`] - a renderer rejected a decoded record.
//!
//! Only [`ServerError`] ever leaves the server. Decode and render failures are
//! contained at the per-frame dispatch point of the connection handler.

use std::io;
use thiserror::Error;

/// Errors that prevent the server from accepting connections.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to resolve listen address {address}: {source}")]
    AddressResolution {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Bind failed on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Listen failed on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors produced while decoding or validating one telemetry frame.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The frame is not valid JSON (this includes invalid UTF-8 and empty frames).
    #[error("Invalid JSON received: {0}")]
    InvalidSyntax(#[from] serde_json::Error),

    /// The JSON parsed, but a required key is absent. Holds the dotted path.
    #[error("Missing telemetry field: {0}")]
    MissingField(String),

    /// A required key is present with the wrong JSON type.
    #[error("Invalid telemetry field {path}: expected {expected}")]
    InvalidField { path: String, expected: &'static str },
}

impl DecodeError {
    /// Dotted path of the offending field, if this is a shape failure.
    pub fn field_path(&self) -> Option<&str> {
        match self {
            DecodeError::InvalidSyntax(_) => None,
            DecodeError::MissingField(path) => Some(path),
            DecodeError::InvalidField { path, .. } => Some(path),
        }
    }
}

/// Errors a [`Renderer`](crate::render::Renderer) may report back to the handler.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Error parsing telemetry: {0}")]
    Telemetry(#[from] DecodeError),

    #[error("Failed to write telemetry: {0}")]
    Io(#[from] io::Error),

    #[error("Telemetry receiver closed")]
    Closed,
}
