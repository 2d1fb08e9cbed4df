//! Content-addressing the effective policy.
//!
//! The hash covers exactly the inputs that can change a decision: the
//! merged rule lists (order-insensitive, so sorted), the provider order,
//! fail-open, and the active LLM backend's identity and deny authority.
//! Timeouts, endpoints, and logging flags are deliberately excluded --
//! changing them must not invalidate the cache.

use sha2::{Digest, Sha256};

use tyr_config::TyrConfig;
use tyr_rules::RulesDebugInfo;

/// 64-hex-char digest partitioning the decision cache.
#[must_use]
pub fn config_hash(rules: &RulesDebugInfo, config: &TyrConfig) -> String {
    let mut allow = rules.allow.clone();
    allow.sort();
    let mut deny = rules.deny.clone();
    deny.sort();

    let providers: Vec<&str> = config.providers.iter().map(|p| p.as_str()).collect();
    let llm = config.active_llm();
    let canonical = serde_json::json!({
        "allow": allow,
        "deny": deny,
        "providers": providers,
        "failOpen": config.fail_open,
        "llm": {
            "provider": config.llm_provider.as_str(),
            "model": llm.model,
            "canDeny": llm.can_deny,
        },
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    let hash = hasher.finalize();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::config_hash;
    use tyr_config::{LlmProviderKind, ProviderTag, TyrConfig};
    use tyr_rules::RulesDebugInfo;

    fn rules(allow: &[&str], deny: &[&str]) -> RulesDebugInfo {
        RulesDebugInfo {
            allow: allow.iter().map(ToString::to_string).collect(),
            deny: deny.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn equal_inputs_equal_hashes() {
        let config = TyrConfig::default();
        let a = config_hash(&rules(&["git *"], &["rm *"]), &config);
        let b = config_hash(&rules(&["git *"], &["rm *"]), &config);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn rule_order_is_irrelevant() {
        let config = TyrConfig::default();
        let a = config_hash(&rules(&["git *", "npm *"], &[]), &config);
        let b = config_hash(&rules(&["npm *", "git *"], &[]), &config);
        assert_eq!(a, b);
    }

    #[test]
    fn each_decision_affecting_field_changes_the_hash() {
        let base_rules = rules(&["git *"], &["rm *"]);
        let base_config = TyrConfig::default();
        let base = config_hash(&base_rules, &base_config);

        let rule_change = config_hash(&rules(&["git *", "ls"], &["rm *"]), &base_config);
        assert_ne!(base, rule_change);

        let deny_change = config_hash(&rules(&["git *"], &["rm *", "curl *"]), &base_config);
        assert_ne!(base, deny_change);

        let mut fail_open = base_config.clone();
        fail_open.fail_open = true;
        assert_ne!(base, config_hash(&base_rules, &fail_open));

        let mut providers = base_config.clone();
        providers.providers = vec![ProviderTag::ChainedCommands, ProviderTag::Llm];
        assert_ne!(base, config_hash(&base_rules, &providers));

        let mut model = base_config.clone();
        model.claude.model = "something-else".to_string();
        assert_ne!(base, config_hash(&base_rules, &model));

        let mut can_deny = base_config.clone();
        can_deny.claude.can_deny = !can_deny.claude.can_deny;
        assert_ne!(base, config_hash(&base_rules, &can_deny));

        let mut backend = base_config.clone();
        backend.llm_provider = LlmProviderKind::Openrouter;
        assert_ne!(base, config_hash(&base_rules, &backend));
    }

    #[test]
    fn excluded_fields_do_not_change_the_hash() {
        let base_rules = rules(&["git *"], &[]);
        let base_config = TyrConfig::default();
        let base = config_hash(&base_rules, &base_config);

        let mut timeout = base_config.clone();
        timeout.claude.timeout = std::time::Duration::from_secs(999);
        assert_eq!(base, config_hash(&base_rules, &timeout));

        let mut endpoint = base_config.clone();
        endpoint.openrouter.endpoint = Some("https://elsewhere.example".to_string());
        assert_eq!(base, config_hash(&base_rules, &endpoint));

        let mut verbose = base_config.clone();
        verbose.verbose_log = true;
        assert_eq!(base, config_hash(&base_rules, &verbose));

        let mut retention = base_config.clone();
        retention.log_retention = "7d".to_string();
        assert_eq!(base, config_hash(&base_rules, &retention));
    }

    #[test]
    fn inactive_backend_model_is_excluded() {
        let base_rules = rules(&[], &[]);
        let config = TyrConfig::default();
        let base = config_hash(&base_rules, &config);

        // Claude is active by default; touching the openrouter model
        // cannot change any decision.
        let mut other = config.clone();
        other.openrouter.model = "different".to_string();
        assert_eq!(base, config_hash(&base_rules, &other));
    }
}
