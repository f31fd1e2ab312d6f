//! Pipeline stages that turn transcripts and summaries into text via the LLM.
//!
//! Each stage renders its own prompt, tags it with a prompt version and hands
//! the structured inputs to [`CachedLlm`](crate::providers::CachedLlm), so a
//! rerun over the same material is served from the response cache.

pub mod post_kit;
pub mod summarize;
pub mod translate;

pub use post_kit::{
    generate_post_kit, localize_post_kit, Platform, PostKit, PostKitRequest,
    POST_KIT_PROMPT_VERSION, POST_KIT_TRANSLATION_PROMPT_VERSION,
};
pub use summarize::{summarize, SummaryRequest, SUMMARY_PROMPT_VERSION};
pub use translate::{translate, TranslationRequest, TRANSLATION_PROMPT_VERSION};

use crate::error::{Result, ScribeError};

/// Language used when the caller does not ask for one.
pub const DEFAULT_LANGUAGE: &str = "English";

/// Reject blank input before spending an LLM call on it.
fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ScribeError::InvalidInput(format!("{} is empty", field)));
    }
    Ok(())
}
