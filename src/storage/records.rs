use crate::common::{VoterError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const MIN_VOTER_ID: u32 = 1;
pub const MAX_VOTER_ID: u32 = 127;

/// Sensor slot number shared by the device database and the mirror store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterId(u8);

impl VoterId {
    pub fn new(id: u32) -> Result<Self> {
        if (MIN_VOTER_ID..=MAX_VOTER_ID).contains(&id) {
            Ok(Self(id as u8))
        } else {
            Err(VoterError::InvalidVoterId(id.to_string()))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VoterId {
    type Err = VoterError;

    fn from_str(s: &str) -> Result<Self> {
        let id: u32 = s.trim().parse()
            .map_err(|_| VoterError::InvalidVoterId(s.to_string()))?;
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    #[serde(rename = "voterID")]
    pub voter_id: String,
    #[serde(rename = "voterName")]
    pub voter_name: String,
    #[serde(rename = "fingerprintEncoding", default)]
    pub fingerprint_encoding: String,
    pub timestamp: NaiveDateTime,
}

impl EnrollmentRecord {
    pub fn new(voter_id: VoterId, voter_name: &str, fingerprint_encoding: String) -> Self {
        Self {
            voter_id: voter_id.to_string(),
            voter_name: voter_name.to_string(),
            fingerprint_encoding,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn matches(&self, voter_id: VoterId) -> bool {
        self.voter_id == voter_id.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    NotFound,
}

/// One entry of the append-only verification log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub status: VerificationStatus,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "voterID", default, deserialize_with = "optional_id_text")]
    pub voter_id: Option<String>,
    #[serde(rename = "voterName", default)]
    pub voter_name: Option<String>,
    #[serde(default, deserialize_with = "percentage")]
    pub confidence: u8,
    #[serde(rename = "fingerprintEncoding", default)]
    pub fingerprint_encoding: String,
    pub timestamp: NaiveDateTime,
}

impl VerificationRecord {
    pub fn matched(
        voter_id: VoterId,
        voter_name: Option<String>,
        confidence: u8,
        fingerprint_encoding: String,
    ) -> Self {
        Self {
            status: VerificationStatus::Success,
            message: format!("Match found with ID {}", voter_id),
            voter_id: Some(voter_id.to_string()),
            voter_name,
            confidence,
            fingerprint_encoding,
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn not_found(fingerprint_encoding: String) -> Self {
        Self {
            status: VerificationStatus::NotFound,
            message: "No match found".to_string(),
            voter_id: None,
            voter_name: None,
            confidence: 0,
            fingerprint_encoding,
            timestamp: chrono::Local::now().naive_local(),
        }
    }
}

// Older logs store the sensor's numeric ID rather than its decimal string
fn optional_id_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

fn percentage<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let raw = value.as_f64().unwrap_or(0.0);
    Ok(if raw.is_nan() { 0 } else { raw.floor().clamp(0.0, 100.0) as u8 })
}
