use crate::common::config::StorageConfig;
use crate::common::{DevMode, VoterError, Result};
use crate::storage::records::{EnrollmentRecord, VerificationRecord, VoterId};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Local JSON copy of the sensor's enrollment database plus the verification log.
///
/// Each file holds a single JSON array and is rewritten in full on every mutation.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    registration_path: PathBuf,
    verification_path: PathBuf,
}

impl MirrorStore {
    pub fn new_with_paths(registration_path: PathBuf, verification_path: PathBuf) -> Result<Self> {
        for path in [&registration_path, &verification_path] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
        }

        Ok(Self {
            registration_path,
            verification_path,
        })
    }

    pub fn new_in_dir(data_dir: &Path, storage: &StorageConfig) -> Result<Self> {
        Self::new_with_paths(
            data_dir.join(&storage.registration_file),
            data_dir.join(&storage.verification_file),
        )
    }

    pub fn new_with_dev_mode(dev_mode: &DevMode, storage: &StorageConfig) -> Result<Self> {
        let data_dir = match (dev_mode.records_dir(), &storage.data_dir) {
            (Some(dir), _) => dir,
            (None, Some(dir)) => dir.clone(),
            (None, None) => {
                // Use system directories
                let dirs = ProjectDirs::from("org", "voterverify", "VoterVerify")
                    .ok_or_else(|| VoterError::Storage("Failed to get project dirs".into()))?;
                dirs.data_dir().to_path_buf()
            }
        };

        tracing::debug!("MirrorStore using directory: {:?}", data_dir);
        Self::new_in_dir(&data_dir, storage)
    }

    pub fn registration_path(&self) -> &Path {
        &self.registration_path
    }

    pub fn verification_path(&self) -> &Path {
        &self.verification_path
    }

    pub fn load_enrollments(&self) -> Result<Vec<EnrollmentRecord>> {
        read_array(&self.registration_path)
    }

    pub fn find_enrollment(&self, voter_id: VoterId) -> Result<Option<EnrollmentRecord>> {
        Ok(self.load_enrollments()?
            .into_iter()
            .find(|record| record.matches(voter_id)))
    }

    pub fn contains(&self, voter_id: VoterId) -> Result<bool> {
        Ok(self.find_enrollment(voter_id)?.is_some())
    }

    /// Inserts the record, replacing any entry with the same voter ID.
    /// Returns true when an existing entry was replaced.
    pub fn upsert_enrollment(&self, record: EnrollmentRecord) -> Result<bool> {
        let mut records = self.load_enrollments()?;

        let replaced = match records.iter_mut().find(|r| r.voter_id == record.voter_id) {
            Some(existing) => {
                *existing = record;
                true
            }
            None => {
                records.push(record);
                false
            }
        };

        write_array(&self.registration_path, &records)?;
        Ok(replaced)
    }

    /// Removes every entry for the voter ID. Fails when the registration file is missing.
    /// Returns true when an entry was actually removed.
    pub fn remove_enrollment(&self, voter_id: VoterId) -> Result<bool> {
        if !self.registration_path.exists() {
            return Err(VoterError::Storage(format!(
                "Registration file {} not found", self.registration_path.display()
            )));
        }

        let mut records = self.load_enrollments()?;
        let before = records.len();
        records.retain(|record| !record.matches(voter_id));
        let removed = records.len() != before;

        write_array(&self.registration_path, &records)?;
        Ok(removed)
    }

    pub fn append_verification(&self, record: VerificationRecord) -> Result<()> {
        let mut records: Vec<VerificationRecord> = read_array(&self.verification_path)?;
        records.push(record);
        write_array(&self.verification_path, &records)
    }

    pub fn load_verifications(&self) -> Result<Vec<VerificationRecord>> {
        read_array(&self.verification_path)
    }

    /// Deletes both files. Missing files are not an error.
    pub fn clear(&self) -> Result<()> {
        for path in [&self.registration_path, &self.verification_path] {
            match fs::remove_file(path) {
                Ok(()) => tracing::info!("Deleted record file: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&contents).map_err(|e| {
        VoterError::Storage(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn write_array<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    Ok(())
}
