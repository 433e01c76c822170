//! Telemetry message types.
//!
//! Decoding happens in two steps on purpose. [`TelemetryRecord::decode`] only
//! checks that a frame is JSON; [`TelemetryRecord::flight`] checks that the
//! JSON carries the flight dashboard a renderer needs. This keeps "not JSON"
//! and "JSON with the wrong shape" distinguishable.

use super::path::Field;
use crate::error::DecodeError;
use chrono::{DateTime, Local};
use serde_json::Value;
use std::net::SocketAddr;

/// One decoded telemetry message.
///
/// Any JSON value decodes; the shape is only checked by [`flight`](Self::flight).
/// Records are timestamped on receipt, since there is no ordering across
/// connections.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    payload: Value,
    received_at: DateTime<Local>,
    source: Option<SocketAddr>,
}

impl TelemetryRecord {
    /// Parses one frame as JSON.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let payload = serde_json::from_slice(frame)?;
        Ok(Self::from_value(payload))
    }

    pub fn from_value(payload: Value) -> Self {
        Self {
            payload,
            received_at: Local::now(),
            source: None,
        }
    }

    /// Tags the record with the peer it arrived from.
    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    /// Validates the required dashboard fields and extracts them.
    ///
    /// Fails with [`DecodeError::MissingField`] naming the first absent key on
    /// the required path, or [`DecodeError::InvalidField`] for a key of the
    /// wrong type. Optional fields never cause a failure.
    pub fn flight(&self) -> Result<FlightSnapshot, DecodeError> {
        let root = Field::root(&self.payload);
        let dashboard = root.get("liveFlightDashboard")?;
        let flight = dashboard.get("currentFlight")?;
        let status = flight.get("flightStatus")?;
        let location = status.get("location")?;
        let battery = flight.get("battery")?;

        let attitude = status.opt("angles").and_then(|angles| {
            Some(Attitude {
                pitch: angles.opt("pitch")?.as_f64().ok()?,
                roll: angles.opt("roll")?.as_f64().ok()?,
                yaw: angles.opt("yaw")?.as_f64().ok()?,
            })
        });
        let alerts = flight.opt("alerts");

        Ok(FlightSnapshot {
            flight_mode: flight.get("flightMode")?.as_str()?.to_string(),
            status: status.get("status")?.as_str()?.to_string(),
            latitude: location.get("latitude")?.as_f64()?,
            longitude: location.get("longitude")?.as_f64()?,
            altitude: status.get("altitude")?.as_f64()?,
            battery_level: battery.get("level")?.as_f64()?,
            flight_name: flight
                .opt("flightName")
                .and_then(|f| f.as_str().ok().map(str::to_string)),
            speed: optional_f64(status.opt("speed")),
            attitude,
            battery_voltage: optional_f64(battery.opt("voltage")),
            battery_current: optional_f64(battery.opt("current")),
            estimated_time_remaining: optional_f64(battery.opt("estimatedTimeRemaining")),
            critical_alerts: alerts
                .as_ref()
                .and_then(|a| a.opt("critical"))
                .map(|f| f.string_list())
                .unwrap_or_default(),
            warnings: alerts
                .as_ref()
                .and_then(|a| a.opt("warnings"))
                .map(|f| f.string_list())
                .unwrap_or_default(),
            system_health: dashboard
                .opt("systemHealth")
                .and_then(|h| h.opt("overallStatus"))
                .and_then(|f| f.as_str().ok().map(str::to_string)),
        })
    }
}

fn optional_f64(field: Option<Field<'_>>) -> Option<f64> {
    field.and_then(|f| f.as_f64().ok())
}

/// Vehicle attitude in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Validated view of `liveFlightDashboard.currentFlight`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSnapshot {
    pub flight_mode: String,
    pub status: String,
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Metres
    pub altitude: f64,
    /// Percent
    pub battery_level: f64,

    pub flight_name: Option<String>,
    /// Ground speed in m/s
    pub speed: Option<f64>,
    pub attitude: Option<Attitude>,
    pub battery_voltage: Option<f64>,
    pub battery_current: Option<f64>,
    pub estimated_time_remaining: Option<f64>,
    pub critical_alerts: Vec<String>,
    pub warnings: Vec<String>,
    pub system_health: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GUIDED: &str = r#"{"liveFlightDashboard":{"currentFlight":{"flightMode":"GUIDED","flightStatus":{"status":"In Air","location":{"latitude":-35.363261,"longitude":149.165230},"altitude":50.0},"battery":{"level":100}}}}"#;

    #[test]
    fn test_decode_and_validate_guided_record() {
        let record = TelemetryRecord::decode(GUIDED.as_bytes()).unwrap();
        let flight = record.flight().unwrap();

        assert_eq!(flight.flight_mode, "GUIDED");
        assert_eq!(flight.status, "In Air");
        assert!((flight.latitude - -35.363261).abs() < 1e-9);
        assert!((flight.longitude - 149.165230).abs() < 1e-9);
        assert_eq!(flight.altitude, 50.0);
        assert_eq!(flight.battery_level, 100.0);
        assert!(flight.speed.is_none());
        assert!(flight.attitude.is_none());
        assert!(flight.critical_alerts.is_empty());
    }

    #[test]
    fn test_not_json_is_invalid_syntax() {
        let err = TelemetryRecord::decode(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSyntax(_)));
    }

    #[test]
    fn test_empty_frame_is_invalid_syntax() {
        let err = TelemetryRecord::decode(b"").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSyntax(_)));
    }

    #[test]
    fn test_invalid_utf8_is_invalid_syntax() {
        let err = TelemetryRecord::decode(&[b'"', 0xFF, 0xFE, b'"']).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSyntax(_)));
    }

    #[test]
    fn test_wrong_shape_parses_but_fails_validation() {
        let record = TelemetryRecord::decode(br#"{"a":1}"#).unwrap();
        let err = record.flight().unwrap_err();
        assert!(matches!(err, DecodeError::MissingField(ref path) if path == "liveFlightDashboard"));
    }

    #[test]
    fn test_missing_nested_field_names_path() {
        let payload = json!({
            "liveFlightDashboard": {"currentFlight": {
                "flightMode": "AUTO",
                "flightStatus": {"status": "On Ground", "location": {"latitude": 1.0, "longitude": 2.0}},
                "battery": {"level": 80}
            }}
        });
        let err = TelemetryRecord::from_value(payload).flight().unwrap_err();
        assert_eq!(
            err.field_path(),
            Some("liveFlightDashboard.currentFlight.flightStatus.altitude")
        );
    }

    #[test]
    fn test_wrong_type_is_invalid_field() {
        let payload = json!({
            "liveFlightDashboard": {"currentFlight": {
                "flightMode": "AUTO",
                "flightStatus": {"status": "In Air", "location": {"latitude": "north", "longitude": 2.0}, "altitude": 3.0},
                "battery": {"level": 80}
            }}
        });
        let err = TelemetryRecord::from_value(payload).flight().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidField { ref path, expected: "number" }
                if path == "liveFlightDashboard.currentFlight.flightStatus.location.latitude"
        ));
    }

    #[test]
    fn test_optional_fields_are_extracted() {
        let payload = json!({
            "liveFlightDashboard": {
                "currentFlight": {
                    "flightName": "SITL_FLIGHT_20240101_1200",
                    "flightMode": "GUIDED",
                    "flightStatus": {
                        "status": "In Air",
                        "location": {"latitude": -35.0, "longitude": 149.0},
                        "altitude": 12.5,
                        "speed": 15,
                        "angles": {"pitch": 0.1, "roll": -0.2, "yaw": 1.5}
                    },
                    "battery": {"level": 87.5, "voltage": 12.4, "current": null, "estimatedTimeRemaining": 30},
                    "alerts": {"critical": [], "warnings": ["GPS glitch"]}
                },
                "systemHealth": {"overallStatus": "Good"}
            }
        });
        let flight = TelemetryRecord::from_value(payload).flight().unwrap();

        assert_eq!(flight.flight_name.as_deref(), Some("SITL_FLIGHT_20240101_1200"));
        assert_eq!(flight.speed, Some(15.0));
        assert_eq!(
            flight.attitude,
            Some(Attitude { pitch: 0.1, roll: -0.2, yaw: 1.5 })
        );
        assert_eq!(flight.battery_level, 87.5);
        assert_eq!(flight.battery_voltage, Some(12.4));
        assert_eq!(flight.battery_current, None);
        assert_eq!(flight.estimated_time_remaining, Some(30.0));
        assert_eq!(flight.warnings, vec!["GPS glitch".to_string()]);
        assert_eq!(flight.system_health.as_deref(), Some("Good"));
    }

    #[test]
    fn test_source_is_attached() {
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let record = TelemetryRecord::decode(GUIDED.as_bytes()).unwrap().with_source(addr);
        assert_eq!(record.source(), Some(addr));
        assert!(record.payload().get("liveFlightDashboard").is_some());
    }
}
