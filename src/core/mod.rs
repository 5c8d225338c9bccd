pub mod face;
pub mod session;

pub use face::{compare_encodings, face_distance, FaceComparison, FaceEncoding};
pub use session::{FingerprintSession, SessionSettings, VerifyOutcome, VoterMatch};
