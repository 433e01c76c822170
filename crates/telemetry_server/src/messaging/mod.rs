//! Telemetry message decoding and validation.

mod path;
pub mod types;

pub use types::{Attitude, FlightSnapshot, TelemetryRecord};
