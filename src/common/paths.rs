use std::path::PathBuf;

// Config search locations; data directories come from DevMode or ProjectDirs

pub fn local_config_file() -> PathBuf {
    PathBuf::from("configs/fingerprint.toml")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/voterverify/fingerprint.toml")
}
