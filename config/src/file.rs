//! Config file IO: load, show, and `config set` mutation.

use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};

use tyr_types::Retention;

use crate::paths::config_path;
use crate::settings::{ConfigError, LlmProviderKind, ProviderTag, RawConfig, TyrConfig};

/// Load and resolve the config file. A missing file yields the defaults.
pub fn load_config() -> Result<TyrConfig, ConfigError> {
    load_config_from(&config_path())
}

/// Load a specific config file (tests and `TYR_CONFIG_FILE` both land here).
pub fn load_config_from(path: &Path) -> Result<TyrConfig, ConfigError> {
    if !path.exists() {
        return Ok(TyrConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let raw: RawConfig = json5::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    raw.resolve()
}

/// Resolved config rendered as pretty JSON for `config show`.
#[must_use]
pub fn show_config(config: &TyrConfig) -> String {
    let providers: Vec<&str> = config.providers.iter().map(|p| p.as_str()).collect();
    let backend = |b: &crate::LlmBackendConfig| {
        json!({
            "model": b.model,
            "endpoint": b.endpoint,
            "timeout": b.timeout.as_secs(),
            "canDeny": b.can_deny,
        })
    };
    let value = json!({
        "providers": providers,
        "failOpen": config.fail_open,
        "verboseLog": config.verbose_log,
        "logRetention": config.log_retention,
        "cacheChecks": config.cache_checks,
        "llm": {"provider": config.llm_provider.as_str()},
        "claude": backend(&config.claude),
        "openrouter": backend(&config.openrouter),
    });
    serde_json::to_string_pretty(&value).unwrap_or_default()
}

/// Keys accepted by `config set`, with their value parsers.
const SETTABLE_KEYS: &[&str] = &[
    "providers",
    "failOpen",
    "verboseLog",
    "logRetention",
    "cacheChecks",
    "llm.provider",
    "llm.model",
    "llm.endpoint",
    "llm.timeout",
    "llm.canDeny",
    "claude.model",
    "claude.endpoint",
    "claude.timeout",
    "claude.canDeny",
    "openrouter.model",
    "openrouter.endpoint",
    "openrouter.timeout",
    "openrouter.canDeny",
];

/// Set one config key, validating the value, and rewrite the file.
///
/// Comments in the existing file are not preserved: the file is re-emitted
/// as plain JSON. The whole document is re-resolved before writing so a
/// `set` can never leave an unloadable config behind.
pub fn set_config_key(path: &Path, key: &str, value: &str) -> Result<(), ConfigError> {
    if !SETTABLE_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
        });
    }

    let parsed = parse_value(key, value)?;

    let mut doc = if path.exists() {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        json5::from_str::<Value>(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
    } else {
        Value::Object(serde_json::Map::new())
    };
    if !doc.is_object() {
        doc = Value::Object(serde_json::Map::new());
    }

    insert_dotted(&mut doc, key, parsed);

    // Re-resolve to catch cross-key problems before anything hits disk.
    let raw: RawConfig =
        serde_json::from_value(doc.clone()).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    raw.resolve()?;

    let rendered = serde_json::to_string_pretty(&doc).unwrap_or_default();
    write_atomic(path, rendered.as_bytes()).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_value(key: &str, value: &str) -> Result<Value, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    match key {
        "failOpen" | "verboseLog" | "cacheChecks" | "llm.canDeny" | "claude.canDeny"
        | "openrouter.canDeny" => match value {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(invalid(format!("expected true or false, got {other:?}"))),
        },
        "llm.timeout" | "claude.timeout" | "openrouter.timeout" => value
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| invalid(format!("expected seconds as an integer, got {value:?}"))),
        "logRetention" => {
            Retention::parse(value).map_err(|e| invalid(e.to_string()))?;
            Ok(Value::String(value.to_string()))
        }
        "providers" => {
            let mut tags = Vec::new();
            for tag in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                ProviderTag::parse(tag)?;
                tags.push(Value::String(tag.to_string()));
            }
            if tags.is_empty() {
                return Err(invalid("expected a comma-separated provider list".into()));
            }
            Ok(Value::Array(tags))
        }
        "llm.provider" => {
            LlmProviderKind::parse(value)?;
            Ok(Value::String(value.to_string()))
        }
        _ => {
            // Remaining keys are free-form strings (model names, endpoints).
            if value.trim().is_empty() {
                return Err(invalid("expected a non-empty string".into()));
            }
            Ok(Value::String(value.to_string()))
        }
    }
}

/// Insert `value` at a dotted path, creating intermediate objects.
fn insert_dotted(doc: &mut Value, key: &str, value: Value) {
    let mut cursor = doc;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            if let Some(map) = cursor.as_object_mut() {
                map.insert(part.to_string(), value);
            }
            return;
        }
        let map = match cursor.as_object_mut() {
            Some(map) => map,
            None => return,
        };
        cursor = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
    }
}

/// Temp-file-and-rename write so a crash never truncates the config.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
