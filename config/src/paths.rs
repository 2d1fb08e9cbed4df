//! Filesystem locations for Tyr's state, with env overrides.

use std::path::PathBuf;

/// Environment variable overriding the config file location.
pub const CONFIG_FILE_ENV: &str = "TYR_CONFIG_FILE";
/// Environment variable overriding the persistence file location.
pub const DB_PATH_ENV: &str = "TYR_DB_PATH";
/// Legacy override: earlier releases logged to a flat file at this path.
/// When set (and `TYR_DB_PATH` is not), the database lands next to it.
pub const LOG_FILE_ENV: &str = "TYR_LOG_FILE";

/// Tyr's state directory, `~/.tyr`.
#[must_use]
pub fn tyr_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tyr")
}

/// The config file path: `TYR_CONFIG_FILE` or `~/.tyr/config.json`.
#[must_use]
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_FILE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| tyr_dir().join("config.json"))
}

/// The env dotfile path, `~/.tyr/.env`.
#[must_use]
pub fn env_file_path() -> PathBuf {
    tyr_dir().join(".env")
}

/// The SQLite database path.
///
/// `TYR_DB_PATH` wins; otherwise the legacy `TYR_LOG_FILE` anchors the
/// database in its directory; otherwise `~/.tyr/tyr.db`.
#[must_use]
pub fn db_path() -> PathBuf {
    if let Some(path) = std::env::var_os(DB_PATH_ENV) {
        return PathBuf::from(path);
    }
    if let Some(legacy) = std::env::var_os(LOG_FILE_ENV) {
        let legacy = PathBuf::from(legacy);
        let dir = legacy.parent().map_or_else(|| PathBuf::from("."), PathBuf::from);
        return dir.join("tyr.db");
    }
    tyr_dir().join("tyr.db")
}
