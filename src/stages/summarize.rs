//! Transcript summarization.

use serde_json::{json, Value};
use tracing::info;

use crate::error::Result;
use crate::providers::{CachedLlm, LlmOutput, LlmRequest};

use super::require_text;

/// Bump when the summary prompt changes; old cache entries stop matching.
pub const SUMMARY_PROMPT_VERSION: &str = "summary-v1.2";

/// Material for one summary.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub title: &'a str,
    pub transcript: &'a str,
    pub language: &'a str,
}

impl SummaryRequest<'_> {
    fn inputs(&self) -> Value {
        json!({
            "title": self.title,
            "transcript": self.transcript,
            "language": self.language,
        })
    }

    fn prompt(&self) -> String {
        format!(
            "You are an expert analyst of technical videos. Summarize the transcript below.\n\
             \n\
             Video title: {title}\n\
             Write the summary in {language}.\n\
             \n\
             Use exactly this Markdown structure:\n\
             \n\
             ## Executive Summary\n\
             [2-3 sentences on what the video covers and why it matters]\n\
             \n\
             ## Key Points\n\
             - [5-10 concrete points, one line each, with data when the speaker gives it]\n\
             \n\
             ## Suggested Audience\n\
             [one sentence]\n\
             \n\
             Do not invent facts that are not in the transcript.\n\
             \n\
             ===== TRANSCRIPT =====\n\
             {transcript}\n\
             ===== END TRANSCRIPT =====",
            title = self.title,
            language = self.language,
            transcript = self.transcript.trim(),
        )
    }
}

/// Summarize a transcript with `model`.
pub async fn summarize(
    llm: &CachedLlm,
    model: &str,
    request: &SummaryRequest<'_>,
) -> Result<LlmOutput> {
    require_text("transcript", request.transcript)?;
    info!(
        title = request.title,
        chars = request.transcript.chars().count(),
        model,
        "Summarizing transcript"
    );
    llm.generate(&LlmRequest {
        model: model.to_string(),
        prompt_version: SUMMARY_PROMPT_VERSION.to_string(),
        prompt: request.prompt(),
        inputs: request.inputs(),
    })
    .await
}
