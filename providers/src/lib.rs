//! Decision providers and the pipeline that consults them.
//!
//! A provider inspects a [`PermissionRequest`] and answers with a
//! [`Verdict`]. The pipeline asks each configured provider in order;
//! the first terminal verdict wins, abstains fall through, and a
//! provider failure is contained as an abstain.

pub mod cache;
pub mod chained;
pub mod llm;
pub mod pipeline;

use std::future::Future;
use std::pin::Pin;

use tyr_types::{PermissionRequest, Verdict};

pub use cache::CacheProvider;
pub use chained::ChainedCommandsProvider;
pub use llm::{ClaudeProvider, LlmOptions, OpenrouterProvider};
pub use pipeline::{PipelineOutcome, run_pipeline};

/// Future type returned by [`Provider::check`]. Evaluation is strictly
/// sequential within one request, so the future need not be `Send`.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<ProviderDecision>> + 'a>>;

/// Prompt and model actually sent to an LLM, for verbose logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmDetail {
    pub prompt: String,
    pub model: String,
}

/// One provider's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDecision {
    pub verdict: Verdict,
    pub reason: Option<String>,
    /// Name to report instead of the answering provider's own; the cache
    /// uses this to surface the provider that originally decided.
    pub provider_override: Option<String>,
    /// Set when this decision was served from the cache.
    pub from_cache: bool,
    /// Set when an LLM produced this decision.
    pub llm: Option<LlmDetail>,
}

impl ProviderDecision {
    #[must_use]
    pub fn abstain() -> Self {
        Self {
            verdict: Verdict::Abstain,
            reason: None,
            provider_override: None,
            from_cache: false,
            llm: None,
        }
    }

    #[must_use]
    pub fn with_verdict(verdict: Verdict, reason: Option<String>) -> Self {
        Self {
            verdict,
            reason,
            provider_override: None,
            from_cache: false,
            llm: None,
        }
    }
}

/// A source of verdicts consulted by the pipeline.
pub trait Provider {
    /// Stable name recorded in logs and cache rows.
    fn name(&self) -> &'static str;

    /// Evaluate one request. Errors are contained by the pipeline and
    /// count as abstain.
    fn check<'a>(&'a self, request: &'a PermissionRequest) -> ProviderFuture<'a>;
}
