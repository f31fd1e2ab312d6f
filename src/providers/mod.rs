//! LLM providers and the cached call wrapper used by every pipeline stage.

pub mod cached;
pub mod claude_cli;
pub mod cost;

use async_trait::async_trait;

use crate::error::Result;

pub use cached::{CachedLlm, LlmOutput, LlmRequest};
pub use claude_cli::ClaudeCliProvider;

/// A backend that turns a prompt into completion text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Run `prompt` and return the trimmed response text.
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::ScribeError;

    /// Provider returning a fixed reply and recording what it was asked.
    pub(crate) struct ScriptedProvider {
        reply: String,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
        last_model: Mutex<Option<String>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
                last_model: Mutex::new(None),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_prompt(&self) -> Option<String> {
            self.last_prompt.lock().unwrap().clone()
        }

        pub(crate) fn last_model(&self) -> Option<String> {
            self.last_model.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "sonnet"
        }

        async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            *self.last_model.lock().unwrap() = model.map(str::to_string);
            Ok(self.reply.clone())
        }
    }

    /// Provider that always fails.
    pub(crate) struct FailingProvider;

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn default_model(&self) -> &str {
            "sonnet"
        }

        async fn complete(&self, _prompt: &str, _model: Option<&str>) -> Result<String> {
            Err(ScribeError::Provider("inner failure".to_string()))
        }
    }
}
