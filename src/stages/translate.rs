//! Text translation.

use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::providers::{CachedLlm, LlmOutput, LlmRequest};

use super::require_text;

pub const TRANSLATION_PROMPT_VERSION: &str = "translation-v1.0";

#[derive(Debug, Clone, Copy)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub target_language: &'a str,
}

impl TranslationRequest<'_> {
    fn inputs(&self) -> Value {
        json!({
            "text": self.text,
            "target_language": self.target_language,
        })
    }

    fn prompt(&self) -> String {
        format!(
            "Translate the following text into {language}.\n\
             Keep the Markdown structure, line breaks, emoji, hashtags, URLs and product \
             names exactly as they are. Reply with the translation only, no preamble.\n\
             \n\
             ===== TEXT =====\n\
             {text}\n\
             ===== END TEXT =====",
            language = self.target_language,
            text = self.text.trim(),
        )
    }
}

/// Translate `request.text` into `request.target_language` with `model`.
pub async fn translate(
    llm: &CachedLlm,
    model: &str,
    request: &TranslationRequest<'_>,
) -> Result<LlmOutput> {
    require_text("text", request.text)?;
    require_text("target language", request.target_language)?;
    info!(
        target_language = request.target_language,
        chars = request.text.chars().count(),
        model,
        "Translating text"
    );
    llm.generate(&LlmRequest {
        model: model.to_string(),
        prompt_version: TRANSLATION_PROMPT_VERSION.to_string(),
        prompt: request.prompt(),
        inputs: request.inputs(),
    })
    .await
}
