//! Persisted record shapes: audit log rows and cached decisions.

use serde::{Deserialize, Serialize};

use crate::Verdict;

/// How a request was run, when not the normal steering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Pipeline runs and the decision is logged, but stdout stays empty.
    Shadow,
    /// Pipeline is skipped entirely; the request is only recorded.
    Audit,
}

impl RunMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shadow => "shadow",
            Self::Audit => "audit",
        }
    }

    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "shadow" => Some(Self::Shadow),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }
}

/// Decision column values. Unlike [`Verdict`] this includes `Error`,
/// recorded when the engine itself failed rather than abstained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogDecision {
    Allow,
    Deny,
    Abstain,
    Error,
}

impl LogDecision {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Abstain => "abstain",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "abstain" => Some(Self::Abstain),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<Verdict> for LogDecision {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allow => Self::Allow,
            Verdict::Deny => Self::Deny,
            Verdict::Abstain => Self::Abstain,
        }
    }
}

/// One audit log row. Every ingress writes exactly one.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub id: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub session_id: String,
    pub cwd: String,
    pub tool_name: String,
    /// Canonicalised tool input (the Bash command string for Bash tools).
    pub tool_input: String,
    /// Verbatim JSON of the request's `tool_input`.
    pub input: String,
    pub decision: LogDecision,
    pub provider: Option<String>,
    pub reason: Option<String>,
    pub duration_ms: i64,
    pub cached: bool,
    pub mode: Option<RunMode>,
}

/// Side row persisted next to a log entry when verbose LLM logging is on.
#[derive(Debug, Clone, Serialize)]
pub struct LlmLogEntry {
    pub log_id: i64,
    pub prompt: String,
    pub model: String,
}

/// A memoised terminal decision, keyed by `(tool_name, tool_input, cwd)`
/// and partitioned by the config fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDecision {
    pub decision: Verdict,
    pub provider: String,
    pub reason: Option<String>,
    pub config_hash: String,
    pub created_at: i64,
}
