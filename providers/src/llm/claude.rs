//! The local subprocess backend: adjudicate by exec'ing a Claude model
//! runner binary.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use tyr_rules::RuleStore;
use tyr_types::PermissionRequest;

use super::parse::parse_llm_response;
use super::prompt::{PromptInputs, build_prompt};
use super::{LlmOptions, adjudicable_command, transcript_tail};
use crate::{LlmDetail, Provider, ProviderDecision, ProviderFuture};

/// Default model runner binary, resolved via `PATH`.
const DEFAULT_RUNNER: &str = "claude";

pub struct ClaudeProvider {
    options: LlmOptions,
    rules: Arc<RuleStore>,
    runner: PathBuf,
}

impl ClaudeProvider {
    #[must_use]
    pub fn new(options: LlmOptions, rules: Arc<RuleStore>) -> Self {
        Self {
            options,
            rules,
            runner: PathBuf::from(DEFAULT_RUNNER),
        }
    }

    /// Override the runner binary (tests point this at a stub).
    #[must_use]
    pub fn with_runner(mut self, runner: impl Into<PathBuf>) -> Self {
        self.runner = runner.into();
        self
    }

    async fn adjudicate(&self, request: &PermissionRequest) -> ProviderDecision {
        let Some(command) = adjudicable_command(request) else {
            return ProviderDecision::abstain();
        };

        let transcript =
            transcript_tail(&request.transcript_path, self.options.transcript_messages).await;
        let prompt = build_prompt(&PromptInputs {
            request,
            command,
            rules: &self.rules.debug_info(),
            can_deny: self.options.can_deny,
            transcript: &transcript,
        });

        // The prompt travels as a single argv element; the runner is
        // exec'd directly, never through a shell. kill_on_drop reaps the
        // child when the timeout wins the race below.
        let spawned = Command::new(&self.runner)
            .arg("-p")
            .arg(&prompt)
            .arg("--model")
            .arg(&self.options.model)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(runner = %self.runner.display(), "Failed to spawn model runner: {e}");
                return ProviderDecision::abstain();
            }
        };

        let output = match tokio::time::timeout(self.options.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::debug!("Model runner failed: {e}");
                return ProviderDecision::abstain();
            }
            Err(_) => {
                tracing::debug!(
                    timeout_secs = self.options.timeout.as_secs(),
                    "Model runner timed out"
                );
                return ProviderDecision::abstain();
            }
        };

        if !output.status.success() {
            tracing::debug!(status = %output.status, "Model runner exited non-zero");
            return ProviderDecision::abstain();
        }

        let body = String::from_utf8_lossy(&output.stdout);
        let Some((verdict, reason)) = parse_llm_response(&body, self.options.can_deny) else {
            tracing::debug!("Unparseable model runner response");
            return ProviderDecision::abstain();
        };

        let mut decision = ProviderDecision::with_verdict(verdict, Some(reason));
        decision.llm = Some(LlmDetail {
            prompt,
            model: self.options.model.clone(),
        });
        decision
    }
}

impl Provider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn check<'a>(&'a self, request: &'a PermissionRequest) -> ProviderFuture<'a> {
        Box::pin(async move { Ok(self.adjudicate(request).await) })
    }
}
