use std::path::PathBuf;
use std::fs;
use crate::common::error::Result;

#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_base_dir(enabled, PathBuf::from("./dev_data"))
    }

    pub fn with_base_dir(enabled: bool, base_dir: PathBuf) -> Result<Self> {
        // Create dev directories if in dev mode
        if enabled {
            fs::create_dir_all(base_dir.join("records"))?;
            fs::create_dir_all(base_dir.join("config"))?;

            tracing::info!("Development mode enabled - records will be saved to: {}",
                           base_dir.display());
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Directory holding the mirror files, or `None` outside dev mode.
    pub fn records_dir(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("records"))
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        self.enabled.then(|| self.base_dir.join("config").join("fingerprint.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_creates_record_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dev = DevMode::with_base_dir(true, dir.path().join("dev")).unwrap();

        let records = dev.records_dir().unwrap();
        assert!(records.is_dir());
        assert!(dev.config_file().unwrap().ends_with("config/fingerprint.toml"));
    }

    #[test]
    fn disabled_dev_mode_has_no_dirs() {
        let dev = DevMode::new(false).unwrap();
        assert!(!dev.is_enabled());
        assert!(dev.records_dir().is_none());
        assert!(dev.config_file().is_none());
    }
}
