//! Ordered provider evaluation with failure isolation.

use tyr_types::{PermissionRequest, Verdict};

use crate::{LlmDetail, Provider};

/// The pipeline's answer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub verdict: Verdict,
    /// Name of the deciding provider; `None` when everything abstained.
    pub provider: Option<String>,
    pub reason: Option<String>,
    /// The decision was served from the cache.
    pub cached: bool,
    /// Present when an LLM made the decision.
    pub llm: Option<LlmDetail>,
}

impl PipelineOutcome {
    #[must_use]
    pub fn abstained() -> Self {
        Self {
            verdict: Verdict::Abstain,
            provider: None,
            reason: None,
            cached: false,
            llm: None,
        }
    }
}

/// Consult providers in declared order. The first terminal verdict wins
/// and ends evaluation; abstains continue; a provider error is contained
/// as an abstain so one broken provider can never fail the request.
pub async fn run_pipeline(
    providers: &[Box<dyn Provider>],
    request: &PermissionRequest,
) -> PipelineOutcome {
    for provider in providers {
        let decision = match provider.check(request).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(provider = provider.name(), "Provider failed: {e:#}");
                continue;
            }
        };
        tracing::debug!(
            provider = provider.name(),
            verdict = %decision.verdict,
            "Provider answered"
        );
        if decision.verdict.is_terminal() {
            let name = decision
                .provider_override
                .unwrap_or_else(|| provider.name().to_string());
            return PipelineOutcome {
                verdict: decision.verdict,
                provider: Some(name),
                reason: decision.reason,
                cached: decision.from_cache,
                llm: decision.llm,
            };
        }
    }
    PipelineOutcome::abstained()
}

#[cfg(test)]
mod tests {
    use super::{PipelineOutcome, run_pipeline};
    use crate::{Provider, ProviderDecision, ProviderFuture};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tyr_types::{PermissionRequest, Verdict};

    fn request() -> PermissionRequest {
        PermissionRequest {
            session_id: "s".into(),
            transcript_path: "/tmp/t.jsonl".into(),
            cwd: "/work".into(),
            permission_mode: "default".into(),
            hook_event_name: "PermissionRequest".into(),
            tool_name: "Bash".into(),
            tool_input: serde_json::json!({ "command": "ls" })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    struct Scripted {
        name: &'static str,
        verdict: Option<Verdict>,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Provider for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn check<'a>(&'a self, _request: &'a PermissionRequest) -> ProviderFuture<'a> {
            Box::pin(async move {
                self.calls.borrow_mut().push(self.name);
                match self.verdict {
                    Some(verdict) => Ok(ProviderDecision::with_verdict(
                        verdict,
                        Some(format!("{} says so", self.name)),
                    )),
                    None => Err(anyhow::anyhow!("provider blew up")),
                }
            })
        }
    }

    fn scripted(
        name: &'static str,
        verdict: Option<Verdict>,
        calls: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Box<dyn Provider> {
        Box::new(Scripted {
            name,
            verdict,
            calls: Rc::clone(calls),
        })
    }

    #[tokio::test]
    async fn first_terminal_verdict_wins() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let providers = vec![
            scripted("first", Some(Verdict::Abstain), &calls),
            scripted("second", Some(Verdict::Deny), &calls),
            scripted("third", Some(Verdict::Allow), &calls),
        ];

        let outcome = run_pipeline(&providers, &request()).await;
        assert_eq!(outcome.verdict, Verdict::Deny);
        assert_eq!(outcome.provider.as_deref(), Some("second"));
        assert_eq!(outcome.reason.as_deref(), Some("second says so"));
        // Providers after the terminal verdict are never invoked.
        assert_eq!(*calls.borrow(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn errors_fall_through() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let providers = vec![
            scripted("broken", None, &calls),
            scripted("healthy", Some(Verdict::Allow), &calls),
        ];

        let outcome = run_pipeline(&providers, &request()).await;
        assert_eq!(outcome.verdict, Verdict::Allow);
        assert_eq!(outcome.provider.as_deref(), Some("healthy"));
    }

    #[tokio::test]
    async fn all_abstain_yields_empty_outcome() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let providers = vec![
            scripted("a", Some(Verdict::Abstain), &calls),
            scripted("b", None, &calls),
        ];

        let outcome = run_pipeline(&providers, &request()).await;
        assert_eq!(outcome, PipelineOutcome::abstained());
        assert_eq!(outcome.provider, None);
        assert_eq!(outcome.reason, None);
    }

    #[tokio::test]
    async fn empty_pipeline_abstains() {
        let outcome = run_pipeline(&[], &request()).await;
        assert_eq!(outcome.verdict, Verdict::Abstain);
    }
}
