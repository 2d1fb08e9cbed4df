//! The chained-commands provider: per-sub-command rule classification
//! with deny-wins aggregation.
//!
//! A chain is at least as dangerous as its most dangerous link, so one
//! denied sub-command denies the whole request. Only a chain whose every
//! link is explicitly allowed preserves the user's intent well enough to
//! auto-approve; anything in between is left to the host's prompt.

use std::sync::Arc;

use tyr_rules::{RuleMatch, RuleStore};
use tyr_shell::decompose;
use tyr_types::{PermissionRequest, Verdict};

use crate::{Provider, ProviderDecision, ProviderFuture};

pub struct ChainedCommandsProvider {
    rules: Arc<RuleStore>,
}

impl ChainedCommandsProvider {
    #[must_use]
    pub fn new(rules: Arc<RuleStore>) -> Self {
        Self { rules }
    }

    fn evaluate(&self, request: &PermissionRequest) -> ProviderDecision {
        let Some(command) = request.bash_command() else {
            return ProviderDecision::abstain();
        };
        if command.trim().is_empty() {
            return ProviderDecision::abstain();
        }

        let commands = decompose(command);
        if commands.is_empty() {
            return ProviderDecision::abstain();
        }

        let mut all_allowed = true;
        for simple in &commands {
            match self.rules.classify(&simple.command) {
                RuleMatch::Deny => {
                    return ProviderDecision::with_verdict(
                        Verdict::Deny,
                        Some(format!("'{}' matches a deny rule", simple.command)),
                    );
                }
                RuleMatch::Allow => {}
                RuleMatch::Unknown => all_allowed = false,
            }
        }

        if all_allowed {
            let reason = if commands.len() == 1 {
                "command matches an allow rule".to_string()
            } else {
                format!("all {} commands match allow rules", commands.len())
            };
            ProviderDecision::with_verdict(Verdict::Allow, Some(reason))
        } else {
            ProviderDecision::abstain()
        }
    }
}

impl Provider for ChainedCommandsProvider {
    fn name(&self) -> &'static str {
        "chained-commands"
    }

    fn check<'a>(&'a self, request: &'a PermissionRequest) -> ProviderFuture<'a> {
        Box::pin(async move { Ok(self.evaluate(request)) })
    }
}
