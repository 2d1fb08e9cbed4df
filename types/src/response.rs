//! The verdict Tyr writes back to the host on stdout.

use serde::{Deserialize, Serialize};

use crate::HOOK_EVENT_NAME;

/// Terminal behavior reported to the host. Abstains never produce a
/// response at all, so there is no third variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Decision {
    behavior: Behavior,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput {
    hook_event_name: String,
    decision: Decision,
}

/// Envelope the host expects on stdout for a terminal verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    hook_specific_output: HookSpecificOutput,
}

impl HookResponse {
    #[must_use]
    pub fn new(behavior: Behavior, message: Option<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: HOOK_EVENT_NAME.to_string(),
                decision: Decision { behavior, message },
            },
        }
    }

    #[must_use]
    pub fn allow(message: Option<String>) -> Self {
        Self::new(Behavior::Allow, message)
    }

    #[must_use]
    pub fn deny(message: Option<String>) -> Self {
        Self::new(Behavior::Deny, message)
    }

    /// Serialize for the wire. The shape is fixed, so this cannot fail.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
