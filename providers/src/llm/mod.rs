//! LLM adjudication: shared options, prompt construction, and response
//! parsing for the two interchangeable backends.
//!
//! Safety invariant: the command text and cwd are data. They are embedded
//! in the prompt as JSON string literals, the subprocess backend execs
//! its runner with an argv array, and the HTTP backend ships a JSON
//! body. Nothing here ever reaches a shell.

mod claude;
mod openrouter;
mod parse;
mod prompt;

pub use claude::ClaudeProvider;
pub use openrouter::OpenrouterProvider;

use std::time::Duration;

use tyr_types::PermissionRequest;

/// Per-message character cap when transcript context is included.
const TRANSCRIPT_MESSAGE_CAP: usize = 500;

/// Backend-independent LLM settings.
#[derive(Debug, Clone)]
pub struct LlmOptions {
    pub model: String,
    /// Chat-completions API root (HTTP backend only).
    pub endpoint: Option<String>,
    /// Hard wall-clock budget for one adjudication.
    pub timeout: Duration,
    /// When false the model is offered allow-or-abstain, and an answered
    /// deny is normalised to abstain with its reason preserved.
    pub can_deny: bool,
    /// How many trailing transcript messages to include in the prompt;
    /// zero disables conversation context.
    pub transcript_messages: usize,
}

impl LlmOptions {
    #[must_use]
    pub fn new(model: impl Into<String>, timeout: Duration, can_deny: bool) -> Self {
        Self {
            model: model.into(),
            endpoint: None,
            timeout,
            can_deny,
            transcript_messages: 0,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    #[must_use]
    pub fn with_transcript_messages(mut self, n: usize) -> Self {
        self.transcript_messages = n;
        self
    }
}

/// The command an LLM backend should adjudicate, or `None` when the
/// backend must abstain without doing any work.
fn adjudicable_command(request: &PermissionRequest) -> Option<&str> {
    let command = request.bash_command()?;
    if command.trim().is_empty() {
        return None;
    }
    Some(command)
}

/// Last `n` transcript messages, each capped to a fixed character count.
/// The transcript is advisory; any read problem yields no context.
async fn transcript_tail(path: &str, n: usize) -> Vec<String> {
    if n == 0 {
        return Vec::new();
    }
    let Ok(text) = tokio::fs::read_to_string(path).await else {
        return Vec::new();
    };
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines
        .iter()
        .rev()
        .take(n)
        .rev()
        .map(|line| cap_chars(line, TRANSCRIPT_MESSAGE_CAP))
        .collect()
}

fn cap_chars(s: &str, cap: usize) -> String {
    if s.chars().count() <= cap {
        return s.to_string();
    }
    s.chars().take(cap).collect()
}
