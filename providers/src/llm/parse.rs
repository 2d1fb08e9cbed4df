//! Parsing a model's adjudication reply.

use serde_json::Value;

use tyr_types::Verdict;

/// Decode `{"decision": ..., "reason": ...}` from a model reply.
///
/// Markdown fences are tolerated; everything else is strict. Any shape
/// problem yields `None`, which the caller treats as abstain. When
/// `can_deny` is false an answered deny is normalised to abstain and the
/// reason survives.
pub(crate) fn parse_llm_response(body: &str, can_deny: bool) -> Option<(Verdict, String)> {
    let stripped = strip_fences(body);
    let value: Value = serde_json::from_str(stripped).ok()?;

    let object = value.as_object()?;
    // A flat object only: nested containers mean the model answered
    // something other than the requested schema.
    if object.values().any(|v| v.is_object() || v.is_array()) {
        return None;
    }

    let decision = object.get("decision")?.as_str()?;
    let reason = object.get("reason")?.as_str()?.to_string();

    let verdict = match decision {
        "allow" => Verdict::Allow,
        "deny" if can_deny => Verdict::Deny,
        // Normalisation rule: a deny answered in allow-or-abstain mode
        // becomes an abstain that keeps its reason.
        "deny" => Verdict::Abstain,
        "abstain" => Verdict::Abstain,
        _ => return None,
    };
    Some((verdict, reason))
}

/// Strip one surrounding markdown fence (```json … ``` or bare ``` … ```).
fn strip_fences(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::{parse_llm_response, strip_fences};
    use tyr_types::Verdict;

    #[test]
    fn plain_object() {
        let (verdict, reason) =
            parse_llm_response(r#"{"decision": "allow", "reason": "read-only"}"#, true).unwrap();
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(reason, "read-only");
    }

    #[test]
    fn fenced_object() {
        let body = "```json\n{\"decision\": \"deny\", \"reason\": \"destructive\"}\n```";
        let (verdict, _) = parse_llm_response(body, true).unwrap();
        assert_eq!(verdict, Verdict::Deny);

        let bare = "```\n{\"decision\": \"allow\", \"reason\": \"ok\"}\n```";
        assert!(parse_llm_response(bare, true).is_some());
    }

    #[test]
    fn deny_normalised_when_cannot_deny() {
        let (verdict, reason) =
            parse_llm_response(r#"{"decision": "deny", "reason": "wipes disk"}"#, false).unwrap();
        assert_eq!(verdict, Verdict::Abstain);
        assert_eq!(reason, "wipes disk");
    }

    #[test]
    fn abstain_accepted_in_both_modes() {
        for can_deny in [true, false] {
            let (verdict, _) =
                parse_llm_response(r#"{"decision": "abstain", "reason": "unsure"}"#, can_deny)
                    .unwrap();
            assert_eq!(verdict, Verdict::Abstain);
        }
    }

    #[test]
    fn malformed_shapes_rejected() {
        for bad in [
            "not json at all",
            "[]",
            r#"["allow"]"#,
            "42",
            r#""allow""#,
            r#"{"decision": "allow"}"#,
            r#"{"reason": "no decision"}"#,
            r#"{"decision": 1, "reason": "typed wrong"}"#,
            r#"{"decision": "allow", "reason": 2}"#,
            r#"{"decision": "maybe", "reason": "unknown word"}"#,
            r#"{"decision": "allow", "reason": "x", "extra": {"nested": true}}"#,
            r#"{"decision": "allow", "reason": "x", "extra": [1]}"#,
            "",
        ] {
            assert!(parse_llm_response(bad, true).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {} "), "{}");
        assert_eq!(strip_fences("{}"), "{}");
    }
}
