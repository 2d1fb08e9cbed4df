//! Stdin parsing and schema validation at the host boundary.
//!
//! Dynamic JSON is validated here, once; everything downstream sees the
//! typed [`PermissionRequest`].

use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use tyr_types::{HOOK_EVENT_NAME, PermissionRequest};

/// Malformed input. Every variant maps to exit code 2 and no log row.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("failed to read request from stdin: {0}")]
    Read(#[from] std::io::Error),
    #[error("request is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request failed validation: {0}")]
    Schema(String),
}

fn request_schema() -> &'static Validator {
    static VALIDATOR: OnceLock<Validator> = OnceLock::new();
    VALIDATOR.get_or_init(|| {
        let schema = serde_json::json!({
            "type": "object",
            "required": [
                "session_id",
                "transcript_path",
                "cwd",
                "permission_mode",
                "hook_event_name",
                "tool_name",
                "tool_input"
            ],
            "properties": {
                "session_id": { "type": "string" },
                "transcript_path": { "type": "string" },
                "cwd": { "type": "string" },
                "permission_mode": { "type": "string" },
                "hook_event_name": { "const": HOOK_EVENT_NAME },
                "tool_name": { "type": "string" },
                "tool_input": { "type": "object" }
            }
        });
        jsonschema::validator_for(&schema).expect("request schema is valid")
    })
}

/// Decode and validate one request.
pub fn parse_request(raw: &str) -> Result<PermissionRequest, IngressError> {
    let value: Value = serde_json::from_str(raw)?;

    let validator = request_schema();
    if let Err(error) = validator.validate(&value) {
        return Err(IngressError::Schema(error.to_string()));
    }

    let request: PermissionRequest = serde_json::from_value(value)?;
    Ok(request)
}
