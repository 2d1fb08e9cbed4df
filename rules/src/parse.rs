//! Extracting Bash rule patterns from one host settings file.
//!
//! The host's settings format carries much more than permissions; only
//! `permissions.allow` / `permissions.deny` string entries naming the
//! `Bash` tool are relevant here. Everything else is ignored without
//! complaint, per entry, so one bad value never discards its siblings.

use serde_json::Value;

/// Bash patterns extracted from one file, in file order.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ExtractedRules {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

/// Parse settings JSON text. Malformed JSON or a wrong-typed
/// `permissions` section is treated as an absent one.
pub(crate) fn extract_bash_patterns(text: &str) -> ExtractedRules {
    let Ok(root) = serde_json::from_str::<Value>(text) else {
        return ExtractedRules::default();
    };
    let permissions = match root.get("permissions") {
        Some(Value::Object(map)) => map,
        _ => return ExtractedRules::default(),
    };

    ExtractedRules {
        allow: collect_patterns(permissions.get("allow")),
        deny: collect_patterns(permissions.get("deny")),
    }
}

fn collect_patterns(list: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(entries)) = list else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(Value::as_str)
        .filter_map(bash_pattern)
        .collect()
}

/// `Bash` means the wildcard; `Bash(X)` means the pattern `X`; any other
/// tool's entry is skipped.
fn bash_pattern(entry: &str) -> Option<String> {
    if entry == "Bash" {
        return Some("*".to_string());
    }
    entry
        .strip_prefix("Bash(")
        .and_then(|rest| rest.strip_suffix(')'))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::{ExtractedRules, bash_pattern, extract_bash_patterns};

    #[test]
    fn extracts_allow_and_deny() {
        let rules = extract_bash_patterns(
            r#"{
                "permissions": {
                    "allow": ["Bash(git *)", "Bash(npm test)"],
                    "deny": ["Bash(rm *)"]
                }
            }"#,
        );
        assert_eq!(rules.allow, vec!["git *", "npm test"]);
        assert_eq!(rules.deny, vec!["rm *"]);
    }

    #[test]
    fn bare_bash_is_wildcard() {
        assert_eq!(bash_pattern("Bash"), Some("*".to_string()));
        assert_eq!(bash_pattern("Bash()"), Some(String::new()));
        assert_eq!(bash_pattern("Bash(x)"), Some("x".to_string()));
    }

    #[test]
    fn other_tools_ignored() {
        let rules = extract_bash_patterns(
            r#"{
                "permissions": {
                    "allow": ["Read(/etc/*)", "WebFetch", "Bash(ls *)"]
                }
            }"#,
        );
        assert_eq!(rules.allow, vec!["ls *"]);
    }

    #[test]
    fn non_string_entries_skipped_individually() {
        let rules = extract_bash_patterns(
            r#"{
                "permissions": {
                    "allow": [42, {"tool": "Bash"}, null, "Bash(git *)"]
                }
            }"#,
        );
        assert_eq!(rules.allow, vec!["git *"]);
    }

    #[test]
    fn malformed_json_is_absent() {
        assert_eq!(extract_bash_patterns("{not json"), ExtractedRules::default());
        assert_eq!(extract_bash_patterns(""), ExtractedRules::default());
    }

    #[test]
    fn wrong_typed_permissions_is_absent() {
        assert_eq!(
            extract_bash_patterns(r#"{"permissions": "all"}"#),
            ExtractedRules::default()
        );
        assert_eq!(
            extract_bash_patterns(r#"{"permissions": {"allow": "Bash"}}"#),
            ExtractedRules::default()
        );
    }

    #[test]
    fn other_settings_keys_ignored() {
        let rules = extract_bash_patterns(
            r#"{"model": "opus", "permissions": {"deny": ["Bash(curl *)"]}}"#,
        );
        assert_eq!(rules.deny, vec!["curl *"]);
        assert!(rules.allow.is_empty());
    }
}
