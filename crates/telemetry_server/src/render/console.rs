//! Human-readable console output.

use super::Renderer;
use crate::error::RenderError;
use crate::messaging::{FlightSnapshot, TelemetryRecord};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::{self, Stdout, Write};
use std::sync::Mutex;

/// Formats one telemetry block for the operator.
///
/// Optional lines are only emitted when the producer sent those fields.
pub fn format_snapshot(flight: &FlightSnapshot, at: DateTime<Local>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "\n=== SITL Telemetry ===");
    let _ = writeln!(out, "Time: {}", at.format("%H:%M:%S"));
    if let Some(name) = &flight.flight_name {
        let _ = writeln!(out, "Flight: {name}");
    }
    let _ = writeln!(out, "Mode: {}", flight.flight_mode);
    let _ = writeln!(out, "Status: {}", flight.status);
    let _ = writeln!(
        out,
        "Position: {:.6}, {:.6}",
        flight.latitude, flight.longitude
    );
    let _ = writeln!(out, "Altitude: {:.1}m", flight.altitude);
    if let Some(speed) = flight.speed {
        let _ = writeln!(out, "Speed: {speed:.1}m/s");
    }
    if let Some(attitude) = flight.attitude {
        let _ = writeln!(
            out,
            "Attitude: pitch {:.2}, roll {:.2}, yaw {:.2}",
            attitude.pitch, attitude.roll, attitude.yaw
        );
    }
    let _ = writeln!(out, "Battery: {}%", flight.battery_level);
    if let Some(detail) = battery_detail(flight) {
        let _ = writeln!(out, "Battery detail: {detail}");
    }
    for alert in &flight.critical_alerts {
        let _ = writeln!(out, "CRITICAL: {alert}");
    }
    for warning in &flight.warnings {
        let _ = writeln!(out, "Warning: {warning}");
    }
    if let Some(health) = &flight.system_health {
        let _ = writeln!(out, "Health: {health}");
    }
    let _ = writeln!(out, "====================");
    out
}

/// Joins whichever of voltage, current and endurance the producer sent.
fn battery_detail(flight: &FlightSnapshot) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(voltage) = flight.battery_voltage {
        parts.push(format!("{voltage:.1}V"));
    }
    if let Some(current) = flight.battery_current {
        parts.push(format!("{current:.1}A"));
    }
    if let Some(minutes) = flight.estimated_time_remaining {
        parts.push(format!("{minutes:.0} min remaining"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Writes formatted telemetry blocks to any [`Write`] sink.
///
/// The sink is behind a mutex so concurrent connections never interleave
/// half-written blocks.
pub struct ConsoleRenderer<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleRenderer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the sink, consuming the renderer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> Renderer for ConsoleRenderer<W> {
    fn display(&self, record: &TelemetryRecord) -> Result<(), RenderError> {
        let flight = record.flight()?;
        let block = format_snapshot(&flight, record.received_at());

        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        out.write_all(block.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
