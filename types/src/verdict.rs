//! The three-valued verdict lattice.

use serde::{Deserialize, Serialize};

/// Outcome of consulting a provider (or the whole pipeline) about a request.
///
/// `Abstain` means "no opinion": the host falls back to its own interactive
/// prompt. When aggregating over several sub-commands, deny strictly
/// dominates allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Deny,
    Abstain,
}

impl Verdict {
    /// Terminal verdicts end pipeline evaluation and may be cached.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Allow | Self::Deny)
    }

    /// Stable lowercase name used in the store and in log output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Abstain => "abstain",
        }
    }

    /// Parse a stored verdict string.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
