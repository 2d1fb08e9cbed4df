//! The host's permission request as read from stdin.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BASH_TOOL, HOOK_EVENT_NAME};

/// A single tool invocation the host is about to perform.
///
/// All top-level fields are required strings; `tool_input` must be an
/// object. Schema validation happens at the ingress edge; code holding a
/// `PermissionRequest` may rely on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub permission_mode: String,
    pub hook_event_name: String,
    pub tool_name: String,
    pub tool_input: Map<String, Value>,
}

/// Structural problems detected after JSON decoding.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("unexpected hook event {found:?} (expected {HOOK_EVENT_NAME:?})")]
    WrongEvent { found: String },
}

impl PermissionRequest {
    /// Ensure the event name matches the one hook Tyr implements.
    pub fn validate_event(&self) -> Result<(), RequestError> {
        if self.hook_event_name == HOOK_EVENT_NAME {
            Ok(())
        } else {
            Err(RequestError::WrongEvent {
                found: self.hook_event_name.clone(),
            })
        }
    }

    /// The shell command string, when this is a `Bash` invocation carrying one.
    #[must_use]
    pub fn bash_command(&self) -> Option<&str> {
        if self.tool_name != BASH_TOOL {
            return None;
        }
        self.tool_input.get("command").and_then(Value::as_str)
    }

    /// Canonical form of `tool_input` used as the cache and log key.
    #[must_use]
    pub fn canonical_tool_input(&self) -> String {
        canonical_tool_input(&self.tool_name, &self.tool_input)
    }

    /// Verbatim JSON of `tool_input`, persisted alongside the canonical form.
    #[must_use]
    pub fn tool_input_json(&self) -> String {
        serde_json::to_string(&self.tool_input).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Canonicalise a tool input for keying.
///
/// For `Bash` the command string itself is the identity of the request.
/// Anything else falls back to the serialized object; `serde_json`'s map
/// keeps keys sorted, so equal inputs produce equal strings.
#[must_use]
pub fn canonical_tool_input(tool_name: &str, tool_input: &Map<String, Value>) -> String {
    if tool_name == BASH_TOOL {
        if let Some(cmd) = tool_input.get("command").and_then(Value::as_str) {
            return cmd.to_string();
        }
    }
    serde_json::to_string(tool_input).unwrap_or_else(|_| "{}".to_string())
}
