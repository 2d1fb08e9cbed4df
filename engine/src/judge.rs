//! The judge: assemble providers, run the pipeline under the selected
//! mode, persist the audit trail, and shape the host response.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tyr_config::{LlmProviderKind, ProviderTag, TyrConfig};
use tyr_providers::llm::LlmOptions;
use tyr_providers::{
    CacheProvider, ChainedCommandsProvider, ClaudeProvider, OpenrouterProvider, PipelineOutcome,
    Provider, run_pipeline,
};
use tyr_rules::RuleStore;
use tyr_store::{CacheKey, NewLogEntry, Store};
use tyr_types::record::{CachedDecision, LogDecision, RunMode};
use tyr_types::{HookResponse, PermissionRequest, Verdict};

use crate::fingerprint::config_hash;
use crate::ingress::{IngressError, parse_request};

/// Provider name reported when fail-open converts a terminal abstain.
const FAIL_OPEN_PROVIDER: &str = "fail-open";

/// Flag-level overrides layered over the loaded config for one run.
#[derive(Debug, Clone, Default)]
pub struct JudgeOptions {
    pub shadow: bool,
    pub audit: bool,
    pub fail_open: Option<bool>,
    pub cache_checks: Option<bool>,
    /// `--no-allow-chained-commands` clears this.
    pub allow_chained_commands: bool,
    pub llm_model: Option<String>,
    pub llm_timeout_secs: Option<u64>,
    pub llm_provider: Option<LlmProviderKind>,
}

impl JudgeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            allow_chained_commands: true,
            ..Self::default()
        }
    }
}

/// One judge run's dependencies, passed explicitly so tests can inject
/// their own paths.
pub struct Engine {
    pub config: TyrConfig,
    /// Override the settings-scope paths (tests); `None` derives them
    /// from the request cwd.
    pub rule_paths: Option<Vec<PathBuf>>,
    pub db_path: PathBuf,
}

impl Engine {
    /// Evaluate one raw request.
    ///
    /// `Ok(Some(json))` is the response to print on stdout; `Ok(None)`
    /// means empty stdout. Both exit 0. `Err` is malformed input, exit 2.
    pub async fn judge(
        &self,
        raw: &str,
        options: &JudgeOptions,
    ) -> Result<Option<String>, IngressError> {
        let request = parse_request(raw)?;
        let started = Instant::now();

        let config = self.effective_config(options);

        let mut rules = RuleStore::load(
            std::path::Path::new(&request.cwd),
            self.rule_paths.clone(),
        );
        if let Err(e) = rules.watch() {
            tracing::debug!("Rule watcher unavailable: {e}");
        }

        // A broken store must not block the decision: degrade to a
        // memory-only run and keep judging.
        let store = match Store::open(&self.db_path) {
            Ok(store) => Some(Rc::new(RefCell::new(store))),
            Err(e) => {
                tracing::warn!("Persistence unavailable, continuing without it: {e}");
                None
            }
        };

        let hash = config_hash(&rules.debug_info(), &config);
        let mode = run_mode(options);

        let outcome = if mode == Some(RunMode::Audit) {
            PipelineOutcome::abstained()
        } else {
            let rules = Arc::new(rules);
            let providers = self.build_providers(&config, options, &rules, store.as_ref(), &hash);
            run_pipeline(&providers, &request).await
        };

        // Fail-open applies to the pipeline's terminal abstain, never to
        // audit runs.
        let outcome = if mode != Some(RunMode::Audit)
            && config.fail_open
            && outcome.verdict == Verdict::Abstain
        {
            PipelineOutcome {
                verdict: Verdict::Allow,
                provider: Some(FAIL_OPEN_PROVIDER.to_string()),
                reason: Some("no provider objected".to_string()),
                cached: false,
                llm: None,
            }
        } else {
            outcome
        };

        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        if let Some(store) = &store {
            self.persist(
                &mut store.borrow_mut(),
                &config,
                &request,
                &outcome,
                mode,
                duration_ms,
                &hash,
            );
        }

        // Shadow and audit never steer the host.
        if mode.is_some() || !outcome.verdict.is_terminal() {
            return Ok(None);
        }

        let response = match outcome.verdict {
            Verdict::Allow => HookResponse::allow(outcome.reason),
            Verdict::Deny => HookResponse::deny(outcome.reason),
            Verdict::Abstain => unreachable!("terminal verdicts only"),
        };
        Ok(Some(response.to_json()))
    }

    /// Layer the judge flags over the loaded config.
    fn effective_config(&self, options: &JudgeOptions) -> TyrConfig {
        let mut config = self.config.clone();
        if let Some(fail_open) = options.fail_open {
            config.fail_open = fail_open;
        }
        if let Some(cache_checks) = options.cache_checks {
            config.cache_checks = cache_checks;
        }
        if let Some(provider) = options.llm_provider {
            config.llm_provider = provider;
        }
        if let Some(model) = &options.llm_model {
            config.active_llm_mut().model = model.clone();
        }
        if let Some(timeout) = options.llm_timeout_secs {
            config.active_llm_mut().timeout = std::time::Duration::from_secs(timeout);
        }
        config
    }

    fn build_providers(
        &self,
        config: &TyrConfig,
        options: &JudgeOptions,
        rules: &Arc<RuleStore>,
        store: Option<&Rc<RefCell<Store>>>,
        hash: &str,
    ) -> Vec<Box<dyn Provider>> {
        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        if config.cache_checks {
            if let Some(store) = store {
                providers.push(Box::new(CacheProvider::new(
                    Rc::clone(store),
                    hash.to_string(),
                )));
            }
        }

        for tag in &config.providers {
            match tag {
                ProviderTag::ChainedCommands => {
                    if options.allow_chained_commands {
                        providers.push(Box::new(ChainedCommandsProvider::new(Arc::clone(rules))));
                    }
                }
                ProviderTag::Llm => {
                    providers.push(self.llm_provider(config, config.llm_provider, rules));
                }
                ProviderTag::Claude => {
                    providers.push(self.llm_provider(config, LlmProviderKind::Claude, rules));
                }
                ProviderTag::Openrouter => {
                    providers.push(self.llm_provider(config, LlmProviderKind::Openrouter, rules));
                }
            }
        }

        providers
    }

    fn llm_provider(
        &self,
        config: &TyrConfig,
        kind: LlmProviderKind,
        rules: &Arc<RuleStore>,
    ) -> Box<dyn Provider> {
        match kind {
            LlmProviderKind::Claude => {
                let backend = &config.claude;
                let options = LlmOptions::new(backend.model.clone(), backend.timeout, backend.can_deny);
                Box::new(ClaudeProvider::new(options, Arc::clone(rules)))
            }
            LlmProviderKind::Openrouter => {
                let backend = &config.openrouter;
                let mut options =
                    LlmOptions::new(backend.model.clone(), backend.timeout, backend.can_deny);
                if let Some(endpoint) = &backend.endpoint {
                    options = options.with_endpoint(endpoint.clone());
                }
                Box::new(OpenrouterProvider::new(options, Arc::clone(rules)))
            }
        }
    }

    /// Write the audit row (and cache row when warranted). Best-effort:
    /// a failure here is logged and never masks the decision.
    #[allow(clippy::too_many_arguments)]
    fn persist(
        &self,
        store: &mut Store,
        config: &TyrConfig,
        request: &PermissionRequest,
        outcome: &PipelineOutcome,
        mode: Option<RunMode>,
        duration_ms: i64,
        hash: &str,
    ) {
        let timestamp = now_ms();

        let entry = NewLogEntry {
            timestamp,
            session_id: request.session_id.clone(),
            cwd: request.cwd.clone(),
            tool_name: request.tool_name.clone(),
            tool_input: request.canonical_tool_input(),
            input: request.tool_input_json(),
            decision: LogDecision::from(outcome.verdict),
            provider: outcome.provider.clone(),
            reason: outcome.reason.clone(),
            duration_ms,
            cached: outcome.cached,
            mode,
        };
        match store.append_log(&entry) {
            Ok(log_id) => {
                if config.verbose_log {
                    if let Some(llm) = &outcome.llm {
                        if let Err(e) = store.append_llm_log(log_id, &llm.prompt, &llm.model) {
                            tracing::warn!("Failed to write LLM log row: {e}");
                        }
                    }
                }
            }
            Err(e) => tracing::warn!("Failed to write audit log row: {e}"),
        }

        // Cache only what the pipeline itself decided: fresh terminal
        // verdicts outside audit mode. Fail-open allows are synthetic and
        // must not stick.
        let cacheable = mode != Some(RunMode::Audit)
            && config.cache_checks
            && outcome.verdict.is_terminal()
            && !outcome.cached
            && outcome.provider.as_deref() != Some(FAIL_OPEN_PROVIDER);
        if cacheable {
            let key = CacheKey {
                tool_name: request.tool_name.clone(),
                tool_input: request.canonical_tool_input(),
                cwd: request.cwd.clone(),
            };
            let decision = CachedDecision {
                decision: outcome.verdict,
                provider: outcome
                    .provider
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                reason: outcome.reason.clone(),
                config_hash: hash.to_string(),
                created_at: timestamp,
            };
            if let Err(e) = store.cache_store(&key, &decision) {
                tracing::warn!("Failed to write cache row: {e}");
            }
        }
    }
}

fn run_mode(options: &JudgeOptions) -> Option<RunMode> {
    if options.audit {
        Some(RunMode::Audit)
    } else if options.shadow {
        Some(RunMode::Shadow)
    } else {
        None
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
