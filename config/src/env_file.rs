//! The `~/.tyr/.env` dotfile.
//!
//! Loaded once at startup to populate missing environment variables
//! (typically `OPENROUTER_API_KEY`). Existing process env always wins.

use std::io::Write;
use std::path::Path;

use crate::settings::ConfigError;

/// Load the dotfile into the process environment without overwriting
/// variables that are already set.
pub fn load_env_file(path: &Path) {
    if !path.exists() {
        return;
    }
    // dotenvy never overrides existing variables via from_path.
    if let Err(e) = dotenvy::from_path(path) {
        tracing::warn!(path = %path.display(), "Failed to load env file: {e}");
    }
}

/// Read the dotfile entries as `(key, value)` pairs for `config env show`.
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for item in dotenvy::from_path_iter(path).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })? {
        let (key, value) = item.map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        entries.push((key, value));
    }
    Ok(entries)
}

/// Set (or replace) one variable in the dotfile for `config env set`.
pub fn set_env_var(path: &Path, key: &str, value: &str) -> Result<(), ConfigError> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "env keys must be alphanumeric with underscores".to_string(),
        });
    }

    let mut entries = read_env_file(path)?;
    if let Some(existing) = entries.iter_mut().find(|(k, _)| k == key) {
        existing.1 = value.to_string();
    } else {
        entries.push((key.to_string(), value.to_string()));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut rendered = String::new();
    for (k, v) in &entries {
        rendered.push_str(k);
        rendered.push('=');
        rendered.push_str(v);
        rendered.push('\n');
    }

    let io_err = |source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(rendered.as_bytes())
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
    tmp.persist(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e.error,
    })?;
    Ok(())
}
