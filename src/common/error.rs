use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoterError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Sensor not ready: {0}")]
    NotReady(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No terminal response from sensor within {0:?}")]
    Timeout(Duration),

    #[error("Voter ID {0} already exists. Please use a different ID.")]
    DuplicateVoter(String),

    #[error("Invalid voter ID: {0} (must be between 1 and 127)")]
    InvalidVoterId(String),

    #[error("Invalid voter name: {0}")]
    InvalidVoterName(String),

    #[error("Sensor error: {0}")]
    Device(String),

    /// The sensor was mutated but the local mirror could not follow.
    #[error("Sensor and local records diverged: {0}")]
    Diverged(String),

    #[error("Sensor session busy")]
    Busy,

    #[error("Invalid face encoding: {0}")]
    InvalidEncoding(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoterError>;
