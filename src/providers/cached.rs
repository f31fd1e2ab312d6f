//! Cache-aware LLM calls.
//!
//! [`CachedLlm`] keys each request by model, prompt version and the structured
//! inputs the prompt was built from. A hit returns the stored text without
//! touching the provider; a miss calls the provider and records the response
//! together with its estimated cost and latency.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CachedResponse, LlmCache, Savings};
use crate::error::Result;

use super::cost::{estimate_cost, estimate_tokens};
use super::LlmProvider;

/// One LLM call as seen by the cache.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    /// Bumped whenever the prompt template changes meaningfully.
    pub prompt_version: String,
    /// Fully rendered prompt sent to the provider.
    pub prompt: String,
    /// Structured values the prompt was rendered from; these form the cache key.
    pub inputs: Value,
}

/// Result of [`CachedLlm::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct LlmOutput {
    pub text: String,
    /// True when the text came from the cache.
    pub from_cache: bool,
    /// Estimated USD cost of the provider call (zero on a hit).
    pub cost: f64,
    /// Time spent waiting on the provider (zero on a hit).
    pub elapsed: Duration,
}

/// Provider plus optional response cache.
#[derive(Clone)]
pub struct CachedLlm {
    provider: Arc<dyn LlmProvider>,
    cache: Option<Arc<LlmCache>>,
}

impl CachedLlm {
    pub fn new(provider: Arc<dyn LlmProvider>, cache: Option<Arc<LlmCache>>) -> Self {
        Self { provider, cache }
    }

    /// Wrapper that always calls the provider.
    pub fn uncached(provider: Arc<dyn LlmProvider>) -> Self {
        Self::new(provider, None)
    }

    pub fn cache(&self) -> Option<&LlmCache> {
        self.cache.as_deref()
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Return the cached text for `request`, or call the provider and cache it.
    ///
    /// Only an unencodable `inputs` value or a provider failure is an error.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmOutput> {
        let cached = match &self.cache {
            Some(cache) => {
                let key =
                    CacheKey::derive(&request.model, &request.prompt_version, &request.inputs)?;
                let hit = cache
                    .lookup(&key)
                    .and_then(|response| cached_text(&key, response));
                if let Some(text) = hit {
                    debug!(
                        key = %key.short(),
                        model = %request.model,
                        version = %request.prompt_version,
                        "LLM response served from cache"
                    );
                    return Ok(LlmOutput {
                        text,
                        from_cache: true,
                        cost: 0.0,
                        elapsed: Duration::ZERO,
                    });
                }
                Some((cache, key))
            }
            None => None,
        };

        let started = Instant::now();
        let text = self
            .provider
            .complete(&request.prompt, Some(&request.model))
            .await?;
        let elapsed = started.elapsed();
        let cost = estimate_cost(
            &request.model,
            estimate_tokens(&request.prompt),
            estimate_tokens(&text),
        )
        .unwrap_or(0.0);

        info!(
            provider = self.provider.name(),
            model = %request.model,
            version = %request.prompt_version,
            elapsed_secs = elapsed.as_secs_f64(),
            cost_usd = cost,
            "LLM call completed"
        );

        if let Some((cache, key)) = cached {
            let mut response = CachedResponse::new();
            response.insert("text".into(), Value::String(text.clone()));
            response.insert("model".into(), Value::String(request.model.clone()));
            response.insert(
                "provider".into(),
                Value::String(self.provider.name().to_string()),
            );
            cache.store(
                &key,
                &request.model,
                &request.prompt_version,
                response,
                Savings::new(cost, elapsed.as_secs_f64()),
            );
        }

        Ok(LlmOutput {
            text,
            from_cache: false,
            cost,
            elapsed,
        })
    }
}

impl std::fmt::Debug for CachedLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedLlm")
            .field("provider", &self.provider.name())
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

fn cached_text(key: &CacheKey, response: CachedResponse) -> Option<String> {
    match response.get("text") {
        Some(Value::String(text)) => Some(text.clone()),
        _ => {
            warn!(key = %key.short(), "Cached response has no text, regenerating");
            None
        }
    }
}
