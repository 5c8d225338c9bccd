use crate::common::{VoterError, Result};
use crate::storage::VoterId;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

/// Reported confidences at or above this value are not trusted.
pub const CONFIDENCE_DISTRUST_FLOOR: u8 = 99;
/// Value substituted for a distrusted confidence.
pub const CAPPED_CONFIDENCE: u8 = 97;

// Request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    Register(VoterId),
    Verify,
    Delete(VoterId),
    DeleteAll,
}

impl fmt::Display for SensorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorCommand::Register(id) => write!(f, "REGISTER:{}", id),
            SensorCommand::Verify => f.write_str("VERIFY"),
            SensorCommand::Delete(id) => write!(f, "DELETE:{}", id),
            SensorCommand::DeleteAll => f.write_str("DELETEALL"),
        }
    }
}

// Response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Ready,
    Success,
    Error,
    NotFound,
    /// Progress updates such as "place finger" or "remove finger".
    #[default]
    #[serde(other)]
    Other,
}

impl SensorStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SensorStatus::Success | SensorStatus::Error | SensorStatus::NotFound)
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorStatus::Ready => "ready",
            SensorStatus::Success => "success",
            SensorStatus::Error => "error",
            SensorStatus::NotFound => "not_found",
            SensorStatus::Other => "progress",
        };
        f.write_str(name)
    }
}

/// One JSON line received from the sensor.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SensorResponse {
    #[serde(default)]
    pub status: SensorStatus,
    #[serde(default, deserialize_with = "loose_text")]
    pub message: String,
    #[serde(default, deserialize_with = "loose_optional_text")]
    pub raw_encoding: Option<String>,
    #[serde(default, deserialize_with = "loose_id")]
    pub id: Option<u32>,
    #[serde(default, deserialize_with = "loose_number")]
    pub confidence: Option<f64>,
}

// Firmware builds disagree on field types, so a badly typed field must not
// cost us the status line it arrived on.

fn loose_optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(loose_optional_text(deserializer)?.unwrap_or_default())
}

fn loose_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u32>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn loose_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

impl SensorResponse {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| VoterError::Protocol(format!("Invalid JSON from sensor ({}): {}", e, line)))
    }

    pub fn raw_encoding(&self) -> String {
        self.raw_encoding.clone().unwrap_or_default()
    }
}

/// Brings a sensor-reported confidence into 0..=100 and caps distrusted values.
pub fn clamp_confidence(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }

    let value = raw.floor().clamp(0.0, 100.0) as u8;
    if value >= CONFIDENCE_DISTRUST_FLOOR {
        CAPPED_CONFIDENCE
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_wire_text() {
        let id = VoterId::new(12).unwrap();
        assert_eq!(SensorCommand::Register(id).to_string(), "REGISTER:12");
        assert_eq!(SensorCommand::Verify.to_string(), "VERIFY");
        assert_eq!(SensorCommand::Delete(id).to_string(), "DELETE:12");
        assert_eq!(SensorCommand::DeleteAll.to_string(), "DELETEALL");
    }

    #[test]
    fn parses_verify_success() {
        let response = SensorResponse::parse(
            r#"{"status":"success","message":"Found","id":12,"confidence":99,"raw_encoding":"0102"}"#
        ).unwrap();

        assert_eq!(response.status, SensorStatus::Success);
        assert_eq!(response.id, Some(12));
        assert_eq!(response.confidence, Some(99.0));
        assert_eq!(response.raw_encoding(), "0102");
    }

    #[test]
    fn badly_typed_fields_keep_the_status() {
        let response = SensorResponse::parse(
            r#"{"status":"success","message":null,"id":"12","confidence":"99","raw_encoding":null}"#
        ).unwrap();

        assert!(response.status.is_terminal());
        assert_eq!(response.message, "");
        assert_eq!(response.id, Some(12));
        assert_eq!(response.confidence, Some(99.0));
        assert_eq!(response.raw_encoding, None);

        let odd = SensorResponse::parse(
            r#"{"status":"error","message":404,"id":-1,"confidence":[1]}"#
        ).unwrap();
        assert_eq!(odd.status, SensorStatus::Error);
        assert_eq!(odd.message, "404");
        assert_eq!(odd.id, None);
        assert_eq!(odd.confidence, None);
    }

    #[test]
    fn unknown_and_missing_status_are_progress() {
        let waiting = SensorResponse::parse(r#"{"status":"waiting","message":"Place finger"}"#).unwrap();
        assert_eq!(waiting.status, SensorStatus::Other);
        assert!(!waiting.status.is_terminal());

        let bare = SensorResponse::parse(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(bare.status, SensorStatus::Other);
    }

    #[test]
    fn terminal_statuses() {
        assert!(SensorStatus::Success.is_terminal());
        assert!(SensorStatus::Error.is_terminal());
        assert!(SensorStatus::NotFound.is_terminal());
        assert!(!SensorStatus::Ready.is_terminal());
    }

    #[test]
    fn malformed_line_is_protocol_error() {
        assert!(matches!(SensorResponse::parse("Fingerprint sensor found!"), Err(VoterError::Protocol(_))));
    }

    #[test]
    fn confidence_is_capped_and_clamped() {
        assert_eq!(clamp_confidence(99.0), 97);
        assert_eq!(clamp_confidence(100.0), 97);
        assert_eq!(clamp_confidence(250.0), 97);
        assert_eq!(clamp_confidence(98.0), 98);
        assert_eq!(clamp_confidence(98.9), 98);
        assert_eq!(clamp_confidence(-5.0), 0);
        assert_eq!(clamp_confidence(f64::NAN), 0);
    }
}
