use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{VoterError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub face: FaceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_settle_delay() -> u64 { 2000 }
fn default_read_timeout() -> u64 { 5000 }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            settle_delay_ms: default_settle_delay(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

impl SensorConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_command_deadline")]
    pub command_deadline_seconds: u64,
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_seconds: u64,
}

fn default_command_deadline() -> u64 { 60 }
fn default_lock_timeout() -> u64 { 10 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_deadline_seconds: default_command_deadline(),
            lock_timeout_seconds: default_lock_timeout(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_registration_file")]
    pub registration_file: String,
    #[serde(default = "default_verification_file")]
    pub verification_file: String,
}

fn default_registration_file() -> String { "registration.json".to_string() }
fn default_verification_file() -> String { "verification.json".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            registration_file: default_registration_file(),
            verification_file: default_verification_file(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FaceConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
}

fn default_match_threshold() -> f64 { 0.6 }

impl Default for FaceConfig {
    fn default() -> Self {
        Self { match_threshold: default_match_threshold() }
    }
}

impl Config {
    /// Loads the local config file if present, then the system one, falling back to defaults.
    pub fn load() -> Result<Self> {
        for path in [paths::local_config_file(), paths::system_config_file()] {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VoterError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| VoterError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensor.port.trim().is_empty() {
            return Err(VoterError::Config("Sensor port must not be empty".into()));
        }
        if self.sensor.baud_rate == 0 {
            return Err(VoterError::Config("Baud rate must be positive".into()));
        }
        if self.sensor.read_timeout_ms == 0 || self.sensor.read_timeout_ms > 60_000 {
            return Err(VoterError::Config(format!(
                "Read timeout must be between 1 and 60000 ms, got {}", self.sensor.read_timeout_ms
            )));
        }
        if self.sensor.settle_delay_ms > 30_000 {
            return Err(VoterError::Config(format!(
                "Settle delay must be at most 30000 ms, got {}", self.sensor.settle_delay_ms
            )));
        }

        // The deadline bounds every command exchange, including finger placement
        if self.session.command_deadline_seconds < 1 || self.session.command_deadline_seconds > 600 {
            return Err(VoterError::Config(format!(
                "Command deadline must be between 1 and 600 seconds, got {}",
                self.session.command_deadline_seconds
            )));
        }
        if self.session.lock_timeout_seconds > 600 {
            return Err(VoterError::Config(format!(
                "Lock timeout must be at most 600 seconds, got {}",
                self.session.lock_timeout_seconds
            )));
        }

        if self.storage.registration_file.is_empty() || self.storage.verification_file.is_empty() {
            return Err(VoterError::Config("Record file names must not be empty".into()));
        }
        if self.storage.registration_file == self.storage.verification_file {
            return Err(VoterError::Config(
                "Registration and verification files must differ".into()
            ));
        }

        if !(0.0..=1.0).contains(&self.face.match_threshold) {
            return Err(VoterError::Config(format!(
                "Face match threshold must be between 0.0 and 1.0, got {}",
                self.face.match_threshold
            )));
        }

        Ok(())
    }
}
