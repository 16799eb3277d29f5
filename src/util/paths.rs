//! Path utilities for checkprobe data directories

use std::path::PathBuf;

/// Get the base data directory (~/.checkprobe)
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".checkprobe"))
        .unwrap_or_else(|| PathBuf::from(".checkprobe"))
}

/// Get the logs directory (~/.checkprobe/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Get the default log file path (~/.checkprobe/logs/checkprobe.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("checkprobe.log")
}

/// Get the default config file path (~/.checkprobe/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}
