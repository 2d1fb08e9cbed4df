//! The cache provider: serve memoised terminal verdicts before any
//! other provider runs.

use std::cell::RefCell;
use std::rc::Rc;

use tyr_store::{CacheKey, Store};
use tyr_types::PermissionRequest;

use crate::{Provider, ProviderDecision, ProviderFuture};

pub struct CacheProvider {
    store: Rc<RefCell<Store>>,
    config_hash: String,
}

impl CacheProvider {
    #[must_use]
    pub fn new(store: Rc<RefCell<Store>>, config_hash: String) -> Self {
        Self { store, config_hash }
    }
}

impl Provider for CacheProvider {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn check<'a>(&'a self, request: &'a PermissionRequest) -> ProviderFuture<'a> {
        Box::pin(async move {
            let key = CacheKey {
                tool_name: request.tool_name.clone(),
                tool_input: request.canonical_tool_input(),
                cwd: request.cwd.clone(),
            };
            let hit = self.store.borrow().cache_lookup(&key, &self.config_hash)?;
            let Some(cached) = hit else {
                return Ok(ProviderDecision::abstain());
            };
            // Downstream sees the provider that originally decided, plus
            // the cached marker for the log row.
            Ok(ProviderDecision {
                verdict: cached.decision,
                reason: cached.reason,
                provider_override: Some(cached.provider),
                from_cache: true,
                llm: None,
            })
        })
    }
}
