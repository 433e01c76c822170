//! Synthetic vehicle state.
//!
//! Stands in for a live autopilot link: a copter hovering over the SITL home
//! location in GUIDED mode with a full battery.

use chrono::{DateTime, Local};
use serde_json::{json, Value};

/// SITL default home position (Canberra Model Aircraft Club).
pub const HOME_LATITUDE: f64 = -35.363261;
pub const HOME_LONGITUDE: f64 = 149.165230;

/// Builds one dashboard update for a flight that started at `started`.
pub fn sample_payload(started: DateTime<Local>) -> Value {
    json!({
        "liveFlightDashboard": {
            "currentFlight": {
                "flightName": flight_name(started),
                "flightStatus": {
                    "status": "In Air",
                    "location": {
                        "latitude": HOME_LATITUDE,
                        "longitude": HOME_LONGITUDE
                    },
                    "altitude": 50,
                    "speed": 15,
                    "angles": {
                        "pitch": 0,
                        "roll": 0,
                        "yaw": 0
                    }
                },
                "battery": {
                    "level": 100,
                    "estimatedTimeRemaining": 30
                },
                "flightMode": "GUIDED",
                "alerts": {
                    "critical": [],
                    "warnings": []
                }
            },
            "systemHealth": {
                "overallStatus": "Good",
                "components": {
                    "GPS": "Functional",
                    "communications": "Stable",
                    "propulsion": "Optimal"
                }
            }
        }
    })
}

pub fn flight_name(started: DateTime<Local>) -> String {
    format!("SITL_FLIGHT_{}", started.format("%Y%m%d_%H%M"))
}

/// Serializes a payload as one wire frame.
pub fn encode_line(payload: &Value) -> String {
    let mut line = payload.to_string();
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use telemetry_server::TelemetryRecord;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_flight_name_format() {
        assert_eq!(flight_name(started()), "SITL_FLIGHT_20240309_1405");
    }

    #[test]
    fn test_encoded_line_is_single_frame() {
        let line = encode_line(&sample_payload(started()));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_payload_is_accepted_by_server() {
        let line = encode_line(&sample_payload(started()));
        let record = TelemetryRecord::decode(line.trim_end().as_bytes()).unwrap();
        let flight = record.flight().unwrap();

        assert_eq!(flight.flight_mode, "GUIDED");
        assert_eq!(flight.status, "In Air");
        assert_eq!(flight.flight_name.as_deref(), Some("SITL_FLIGHT_20240309_1405"));
        assert!((flight.latitude - HOME_LATITUDE).abs() < 1e-9);
        assert!((flight.longitude - HOME_LONGITUDE).abs() < 1e-9);
        assert_eq!(flight.altitude, 50.0);
        assert_eq!(flight.speed, Some(15.0));
        assert_eq!(flight.battery_level, 100.0);
        assert_eq!(flight.estimated_time_remaining, Some(30.0));
        assert!(flight.critical_alerts.is_empty());
        assert!(flight.warnings.is_empty());
        assert_eq!(flight.system_health.as_deref(), Some("Good"));
    }
}
