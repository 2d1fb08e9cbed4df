//! Resolved configuration types and the raw-to-resolved boundary.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use tyr_types::Retention;

/// Default model for the local Claude runner backend.
pub const DEFAULT_CLAUDE_MODEL: &str = "haiku";
/// Default model for the OpenRouter backend.
pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-4o-mini";
/// Default chat-completions API root for the OpenRouter backend.
pub const DEFAULT_OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1";
/// Default wall-clock budget for one LLM adjudication.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("unknown config key {key:?}")]
    UnknownKey { key: String },
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A provider slot in the pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTag {
    ChainedCommands,
    /// The LLM backend currently selected by `llm.provider`.
    Llm,
    Claude,
    Openrouter,
}

impl ProviderTag {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "chained-commands" => Ok(Self::ChainedCommands),
            "llm" => Ok(Self::Llm),
            "claude" => Ok(Self::Claude),
            "openrouter" => Ok(Self::Openrouter),
            other => Err(ConfigError::InvalidValue {
                key: "providers".to_string(),
                message: format!("unknown provider tag {other:?}"),
            }),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChainedCommands => "chained-commands",
            Self::Llm => "llm",
            Self::Claude => "claude",
            Self::Openrouter => "openrouter",
        }
    }
}

/// Which LLM backend adjudicates unknown commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    #[default]
    Claude,
    Openrouter,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "claude" => Ok(Self::Claude),
            "openrouter" => Ok(Self::Openrouter),
            other => Err(ConfigError::InvalidValue {
                key: "llm.provider".to_string(),
                message: format!("unknown LLM provider {other:?}"),
            }),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Openrouter => "openrouter",
        }
    }
}

/// Per-backend LLM settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmBackendConfig {
    pub model: String,
    pub endpoint: Option<String>,
    pub timeout: Duration,
    /// When false, the backend may only answer allow-or-abstain; a deny is
    /// rewritten to abstain on parse.
    pub can_deny: bool,
}

impl LlmBackendConfig {
    fn claude_default() -> Self {
        Self {
            model: DEFAULT_CLAUDE_MODEL.to_string(),
            endpoint: None,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            can_deny: false,
        }
    }

    fn openrouter_default() -> Self {
        Self {
            model: DEFAULT_OPENROUTER_MODEL.to_string(),
            endpoint: Some(DEFAULT_OPENROUTER_ENDPOINT.to_string()),
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            can_deny: false,
        }
    }
}

/// Fully-resolved configuration. Defaults are applied; legacy spellings
/// have been migrated.
#[derive(Debug, Clone, PartialEq)]
pub struct TyrConfig {
    /// Pipeline order. The cache check is implicit and always first when
    /// `cache_checks` is on.
    pub providers: Vec<ProviderTag>,
    /// Convert a terminal abstain into allow.
    pub fail_open: bool,
    /// Also persist LLM prompt and model next to the log row.
    pub verbose_log: bool,
    /// Raw retention string, kept for `config show` round-trips.
    pub log_retention: String,
    pub retention: Retention,
    pub cache_checks: bool,
    pub llm_provider: LlmProviderKind,
    pub claude: LlmBackendConfig,
    pub openrouter: LlmBackendConfig,
}

impl Default for TyrConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderTag::ChainedCommands],
            fail_open: false,
            verbose_log: false,
            log_retention: "30d".to_string(),
            retention: Retention::default(),
            cache_checks: true,
            llm_provider: LlmProviderKind::default(),
            claude: LlmBackendConfig::claude_default(),
            openrouter: LlmBackendConfig::openrouter_default(),
        }
    }
}

impl TyrConfig {
    /// The backend selected by `llm.provider`.
    #[must_use]
    pub fn active_llm(&self) -> &LlmBackendConfig {
        match self.llm_provider {
            LlmProviderKind::Claude => &self.claude,
            LlmProviderKind::Openrouter => &self.openrouter,
        }
    }

    #[must_use]
    pub fn active_llm_mut(&mut self) -> &mut LlmBackendConfig {
        match self.llm_provider {
            LlmProviderKind::Claude => &mut self.claude,
            LlmProviderKind::Openrouter => &mut self.openrouter,
        }
    }
}

// ── Raw shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawBackend {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Option<u64>,
    pub can_deny: Option<bool>,
}

/// Raw config as it appears on disk. Tolerates unknown keys and both the
/// legacy flat `llm*` spelling and the nested per-backend shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawConfig {
    pub providers: Option<Vec<String>>,
    pub fail_open: Option<bool>,
    pub verbose_log: Option<bool>,
    pub log_retention: Option<String>,
    pub cache_checks: Option<bool>,
    pub llm: Option<RawBackend>,
    pub claude: Option<RawBackend>,
    pub openrouter: Option<RawBackend>,
    // Legacy flat keys; migrated into the nested shape on read.
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub llm_endpoint: Option<String>,
    pub llm_timeout: Option<u64>,
    pub llm_can_deny: Option<bool>,
    #[serde(flatten)]
    pub _rest: serde_json::Map<String, Value>,
}

impl RawConfig {
    pub(crate) fn resolve(self) -> Result<TyrConfig, ConfigError> {
        let mut config = TyrConfig::default();

        if let Some(tags) = self.providers {
            let mut providers = Vec::with_capacity(tags.len());
            for tag in &tags {
                providers.push(ProviderTag::parse(tag)?);
            }
            config.providers = providers;
        }
        if let Some(fail_open) = self.fail_open {
            config.fail_open = fail_open;
        }
        if let Some(verbose_log) = self.verbose_log {
            config.verbose_log = verbose_log;
        }
        if let Some(retention) = self.log_retention {
            config.retention =
                Retention::parse(&retention).map_err(|e| ConfigError::InvalidValue {
                    key: "logRetention".to_string(),
                    message: e.to_string(),
                })?;
            config.log_retention = retention;
        }
        if let Some(cache_checks) = self.cache_checks {
            config.cache_checks = cache_checks;
        }

        // Oldest shape first, so newer spellings win on conflict: flat
        // llm* keys, then the nested `llm` object, then the per-backend
        // `claude` / `openrouter` objects.
        let flat = RawBackend {
            provider: self.llm_provider,
            model: self.llm_model,
            endpoint: self.llm_endpoint,
            timeout: self.llm_timeout,
            can_deny: self.llm_can_deny,
        };
        apply_llm_object(&mut config, flat)?;
        if let Some(llm) = self.llm {
            apply_llm_object(&mut config, llm)?;
        }
        if let Some(claude) = self.claude {
            apply_backend(&mut config.claude, claude);
        }
        if let Some(openrouter) = self.openrouter {
            apply_backend(&mut config.openrouter, openrouter);
        }

        Ok(config)
    }
}

/// Apply an `llm`-shaped object: its `provider` field selects the active
/// backend and the remaining fields configure that backend.
fn apply_llm_object(config: &mut TyrConfig, raw: RawBackend) -> Result<(), ConfigError> {
    if let Some(provider) = &raw.provider {
        config.llm_provider = LlmProviderKind::parse(provider)?;
    }
    apply_backend(config.active_llm_mut(), raw);
    Ok(())
}

fn apply_backend(backend: &mut LlmBackendConfig, raw: RawBackend) {
    if let Some(model) = raw.model {
        backend.model = model;
    }
    if let Some(endpoint) = raw.endpoint {
        backend.endpoint = Some(endpoint);
    }
    if let Some(timeout) = raw.timeout {
        backend.timeout = Duration::from_secs(timeout);
    }
    if let Some(can_deny) = raw.can_deny {
        backend.can_deny = can_deny;
    }
}
