//! The remote HTTP backend: adjudicate through a hosted
//! chat-completions API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use tyr_rules::RuleStore;
use tyr_types::PermissionRequest;

use super::parse::parse_llm_response;
use super::prompt::{PromptInputs, build_prompt};
use super::{LlmOptions, adjudicable_command, transcript_tail};
use crate::{LlmDetail, Provider, ProviderDecision, ProviderFuture};

/// Credential environment variable; absent means the provider abstains
/// without attempting any network IO.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Connection establishment budget, separate from the overall timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hard cap on answer size; the reply is one small JSON object.
const MAX_TOKENS: u32 = 256;

pub struct OpenrouterProvider {
    options: LlmOptions,
    rules: Arc<RuleStore>,
    key_env: &'static str,
}

impl OpenrouterProvider {
    #[must_use]
    pub fn new(options: LlmOptions, rules: Arc<RuleStore>) -> Self {
        Self {
            options,
            rules,
            key_env: API_KEY_ENV,
        }
    }

    /// Override the credential variable name (tests isolate themselves
    /// with unique names).
    #[must_use]
    pub fn with_key_env(mut self, key_env: &'static str) -> Self {
        self.key_env = key_env;
        self
    }

    async fn adjudicate(&self, request: &PermissionRequest) -> ProviderDecision {
        let Some(command) = adjudicable_command(request) else {
            return ProviderDecision::abstain();
        };
        let Ok(api_key) = std::env::var(self.key_env) else {
            tracing::debug!("No {} in environment; skipping remote LLM", self.key_env);
            return ProviderDecision::abstain();
        };
        let Some(endpoint) = self.options.endpoint.as_deref() else {
            tracing::debug!("Remote LLM has no endpoint configured");
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

        let client = match reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.options.timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::debug!("Failed to build HTTP client: {e}");
                return ProviderDecision::abstain();
            }
        };

        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));
        let body = json!({
            "model": self.options.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0,
            "max_tokens": MAX_TOKENS,
        });

        let response = match client
            .post(&url)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Remote LLM request failed: {e}");
                return ProviderDecision::abstain();
            }
        };

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Remote LLM returned an error status");
            return ProviderDecision::abstain();
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Remote LLM response was not JSON: {e}");
                return ProviderDecision::abstain();
            }
        };
        let Some(content) = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
        else {
            tracing::debug!("Remote LLM response had no message content");
            return ProviderDecision::abstain();
        };

        let Some((verdict, reason)) = parse_llm_response(content, self.options.can_deny) else {
            tracing::debug!("Unparseable remote LLM answer");
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

impl Provider for OpenrouterProvider {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn check<'a>(&'a self, request: &'a PermissionRequest) -> ProviderFuture<'a> {
        Box::pin(async move { Ok(self.adjudicate(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::OpenrouterProvider;
    use crate::Provider;
    use crate::llm::LlmOptions;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tyr_rules::RuleStore;
    use tyr_types::{PermissionRequest, Verdict};
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn empty_rules() -> Arc<RuleStore> {
        Arc::new(RuleStore::load(Path::new("/none"), Some(vec![])))
    }

    fn bash_request(command: &str) -> PermissionRequest {
        PermissionRequest {
            session_id: "s".into(),
            transcript_path: "/tmp/t.jsonl".into(),
            cwd: "/work".into(),
            permission_mode: "default".into(),
            hook_event_name: "PermissionRequest".into(),
            tool_name: "Bash".into(),
            tool_input: serde_json::json!({ "command": command })
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    fn provider(endpoint: &str, can_deny: bool, key_env: &'static str) -> OpenrouterProvider {
        let options = LlmOptions::new("test/model", Duration::from_secs(5), can_deny)
            .with_endpoint(endpoint);
        OpenrouterProvider::new(options, empty_rules()).with_key_env(key_env)
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn happy_path_allow() {
        let server = MockServer::start().await;
        std::env::set_var("TYR_TEST_OR_KEY_HAPPY", "sk-or-abc");
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-or-abc"))
            .and(body_partial_json(serde_json::json!({
                "model": "test/model",
                "temperature": 0,
                "max_tokens": 256,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"decision": "allow", "reason": "read-only"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), true, "TYR_TEST_OR_KEY_HAPPY");
        let decision = provider.check(&bash_request("ls -la")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Allow);
        assert_eq!(decision.reason.as_deref(), Some("read-only"));
        assert!(decision.llm.is_some());
    }

    #[tokio::test]
    async fn missing_credential_abstains_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), true, "TYR_TEST_OR_KEY_UNSET");
        let decision = provider.check(&bash_request("ls")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
    }

    #[tokio::test]
    async fn http_error_abstains() {
        let server = MockServer::start().await;
        std::env::set_var("TYR_TEST_OR_KEY_ERR", "sk");
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), true, "TYR_TEST_OR_KEY_ERR");
        let decision = provider.check(&bash_request("ls")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
    }

    #[tokio::test]
    async fn garbage_content_abstains() {
        let server = MockServer::start().await;
        std::env::set_var("TYR_TEST_OR_KEY_GARBAGE", "sk");
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("the command seems fine to me")),
            )
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), true, "TYR_TEST_OR_KEY_GARBAGE");
        let decision = provider.check(&bash_request("ls")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
    }

    #[tokio::test]
    async fn deny_normalised_when_cannot_deny() {
        let server = MockServer::start().await;
        std::env::set_var("TYR_TEST_OR_KEY_NORM", "sk");
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"decision": "deny", "reason": "dangerous"}"#,
            )))
            .mount(&server)
            .await;

        let provider = provider(&server.uri(), false, "TYR_TEST_OR_KEY_NORM");
        let decision = provider.check(&bash_request("rm -rf /")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
        assert_eq!(decision.reason.as_deref(), Some("dangerous"));
    }

    #[tokio::test]
    async fn timeout_abstains() {
        let server = MockServer::start().await;
        std::env::set_var("TYR_TEST_OR_KEY_SLOW", "sk");
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body(r#"{"decision": "allow", "reason": "x"}"#))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let options = LlmOptions::new("test/model", Duration::from_millis(200), true)
            .with_endpoint(server.uri());
        let provider = OpenrouterProvider::new(options, empty_rules())
            .with_key_env("TYR_TEST_OR_KEY_SLOW");

        let started = std::time::Instant::now();
        let decision = provider.check(&bash_request("ls")).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn non_bash_tool_abstains_without_request() {
        let provider = provider("http://127.0.0.1:9", true, "TYR_TEST_OR_KEY_TOOL");
        let mut request = bash_request("ls");
        request.tool_name = "Write".into();
        let decision = provider.check(&request).await.unwrap();
        assert_eq!(decision.verdict, Verdict::Abstain);
    }
}
