// Core modules
pub mod common;
pub mod core;
pub mod device;
pub mod storage;

// Re-export commonly used types
pub use self::common::{Config, DevMode, VoterError, Result};
pub use self::core::{FingerprintSession, SessionSettings, VerifyOutcome, VoterMatch, FaceComparison};
pub use self::device::{LineLink, SensorLink, SerialLink};
pub use self::storage::{MirrorStore, EnrollmentRecord, VerificationRecord, VoterId};
