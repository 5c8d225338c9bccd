pub mod mirror_store;
pub mod records;

pub use mirror_store::MirrorStore;
pub use records::{EnrollmentRecord, VerificationRecord, VerificationStatus, VoterId};
