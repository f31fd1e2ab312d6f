//! LinkedIn post and Twitter/X thread generation from a video summary.
//!
//! The generated text is reviewed against [`PostKitLimits`]; anything out of
//! range is reported as a warning for manual review rather than an error.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::PostKitLimits;
use crate::error::Result;
use crate::providers::{CachedLlm, LlmOutput, LlmRequest};

use super::require_text;

pub const POST_KIT_PROMPT_VERSION: &str = "post-kit-v1.1";
pub const POST_KIT_TRANSLATION_PROMPT_VERSION: &str = "post-kit-translation-v1.0";

/// Social platform a post kit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinkedIn,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Platform::LinkedIn),
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Err(format!(
                "unknown platform '{}' (expected linkedin or twitter)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PostKitRequest<'a> {
    pub platform: Platform,
    pub title: &'a str,
    pub summary: &'a str,
    pub language: &'a str,
}

/// Generated post plus review notes.
#[derive(Debug, Clone, PartialEq)]
pub struct PostKit {
    pub platform: Platform,
    pub output: LlmOutput,
    /// Limits the text falls outside of; empty when it looks publishable.
    pub warnings: Vec<String>,
    /// Localized copy of `output`, when one was requested and succeeded.
    pub translated: Option<LlmOutput>,
}

impl PostKit {
    /// The text to publish: the translation if there is one.
    pub fn text(&self) -> &str {
        self.translated
            .as_ref()
            .map_or(self.output.text.as_str(), |t| t.text.as_str())
    }
}

impl PostKitRequest<'_> {
    fn inputs(&self, limits: &PostKitLimits) -> Value {
        json!({
            "platform": self.platform.as_str(),
            "title": self.title,
            "summary": self.summary,
            "language": self.language,
            "limits": limits,
        })
    }

    fn prompt(&self, limits: &PostKitLimits) -> String {
        let instructions = match self.platform {
            Platform::LinkedIn => format!(
                "You are a LinkedIn content creator. Write a post about this video.\n\
                 Length: {min}-{max} characters in total (critical).\n\
                 \n\
                 Use exactly this format:\n\
                 \n\
                 Hook: [one clear statement establishing relevance]\n\
                 Intro: [1-2 sentences of context]\n\
                 Insight1: [mini subtitle]: [brief explanation]\n\
                 ... ({min_insights} to {max_insights} insights, numbered)\n\
                 WhyItMatters: [industry context or personal reflection]\n\
                 CTA: [a natural closing question]\n\
                 Tags: #Tag1 #Tag2 #Tag3\n\
                 \n\
                 Tone: professional but approachable, confident statements, no hype.",
                min = limits.linkedin_min_chars,
                max = limits.linkedin_max_chars,
                min_insights = limits.linkedin_min_insights,
                max_insights = limits.linkedin_max_insights,
            ),
            Platform::Twitter => format!(
                "You are a tech content creator on Twitter/X. Write a thread about this video.\n\
                 Length: {min}-{max} tweets (critical), each at most {chars} characters.\n\
                 \n\
                 Use exactly this format, one tweet per line:\n\
                 \n\
                 1. [hook with clear value]\n\
                 2. [one insight per tweet, with concrete data when available]\n\
                 ...\n\
                 N. [natural call to action with a light question]\n\
                 \n\
                 Hashtags: tag1, tag2 (at most {hashtags})\n\
                 \n\
                 Tone: conversational but credible, one point per tweet, 1-2 relevant emoji.",
                min = limits.twitter_min_tweets,
                max = limits.twitter_max_tweets,
                chars = limits.twitter_max_chars_per_tweet,
                hashtags = limits.twitter_max_hashtags,
            ),
        };
        format!(
            "{instructions}\n\
             Write in {language}.\n\
             \n\
             Video title: {title}\n\
             \n\
             ===== SUMMARY =====\n\
             {summary}\n\
             ===== END SUMMARY =====\n\
             \n\
             Reply with the post only.",
            language = self.language,
            title = self.title,
            summary = self.summary.trim(),
        )
    }
}

/// Generate a post kit for `request.platform` with `model`.
pub async fn generate_post_kit(
    llm: &CachedLlm,
    model: &str,
    request: &PostKitRequest<'_>,
    limits: &PostKitLimits,
) -> Result<PostKit> {
    require_text("summary", request.summary)?;
    info!(
        platform = %request.platform,
        title = request.title,
        model,
        "Generating post kit"
    );
    let output = llm
        .generate(&LlmRequest {
            model: model.to_string(),
            prompt_version: POST_KIT_PROMPT_VERSION.to_string(),
            prompt: request.prompt(limits),
            inputs: request.inputs(limits),
        })
        .await?;

    let warnings = review(request.platform, &output.text, limits);
    if !warnings.is_empty() {
        warn!(
            platform = %request.platform,
            issues = %warnings.join("; "),
            "Post kit may need manual review"
        );
    }
    Ok(PostKit {
        platform: request.platform,
        output,
        warnings,
        translated: None,
    })
}

fn translation_prompt(platform: Platform, text: &str, target_language: &str) -> String {
    let structure = match platform {
        Platform::LinkedIn => {
            "Keep the line labels (Hook:, Intro:, Insight1: ..., WhyItMatters:, CTA:, Tags:) \
             in English exactly as written and translate only what follows them."
        }
        Platform::Twitter => {
            "Keep the tweet numbering (1., 2., ...) and the Hashtags: label exactly as written, \
             one tweet per line, each within the same character limit."
        }
    };
    format!(
        "Translate this {platform} post into {target_language} with a professional but \
         conversational tone.\n\
         {structure}\n\
         Keep emoji, hashtags, URLs and product names unchanged.\n\
         \n\
         ===== POST =====\n\
         {text}\n\
         ===== END POST =====\n\
         \n\
         Reply with the translated post only.",
        text = text.trim(),
    )
}

/// Translate a generated kit into `target_language` and review the result.
///
/// A failed translation is logged and the kit comes back untranslated; the
/// original post is still publishable.
pub async fn localize_post_kit(
    llm: &CachedLlm,
    model: &str,
    mut kit: PostKit,
    target_language: &str,
    limits: &PostKitLimits,
) -> PostKit {
    if target_language.trim().is_empty() {
        return kit;
    }
    info!(
        platform = %kit.platform,
        target_language,
        model,
        "Translating post kit"
    );
    let result = llm
        .generate(&LlmRequest {
            model: model.to_string(),
            prompt_version: POST_KIT_TRANSLATION_PROMPT_VERSION.to_string(),
            prompt: translation_prompt(kit.platform, &kit.output.text, target_language),
            inputs: json!({
                "platform": kit.platform.as_str(),
                "text": kit.output.text,
                "target_language": target_language,
            }),
        })
        .await;

    match result {
        Ok(translated) => {
            let warnings = review(kit.platform, &translated.text, limits);
            if !warnings.is_empty() {
                warn!(
                    platform = %kit.platform,
                    target_language,
                    issues = %warnings.join("; "),
                    "Translated post kit may need manual review"
                );
            }
            kit.warnings = warnings;
            kit.translated = Some(translated);
        }
        Err(e) => {
            warn!(
                platform = %kit.platform,
                target_language,
                error = %e,
                "Post kit translation failed, keeping the original"
            );
        }
    }
    kit
}

/// Check generated text against the platform limits.
pub fn review(platform: Platform, text: &str, limits: &PostKitLimits) -> Vec<String> {
    match platform {
        Platform::LinkedIn => review_linkedin(text, limits),
        Platform::Twitter => review_twitter(text, limits),
    }
}

fn review_linkedin(text: &str, limits: &PostKitLimits) -> Vec<String> {
    let mut warnings = Vec::new();
    let chars = text.trim().chars().count();
    if chars < limits.linkedin_min_chars || chars > limits.linkedin_max_chars {
        warnings.push(format!(
            "LinkedIn post is {} characters (expected {}-{})",
            chars, limits.linkedin_min_chars, limits.linkedin_max_chars
        ));
    }
    let insights = text
        .lines()
        .filter(|line| line.trim_start().starts_with("Insight"))
        .count();
    if insights < limits.linkedin_min_insights || insights > limits.linkedin_max_insights {
        warnings.push(format!(
            "LinkedIn post has {} insights (expected {}-{})",
            insights, limits.linkedin_min_insights, limits.linkedin_max_insights
        ));
    }
    for label in ["Hook:", "Intro:", "WhyItMatters:", "CTA:"] {
        if !text.lines().any(|line| line.trim_start().starts_with(label)) {
            warnings.push(format!("LinkedIn post is missing '{}'", label));
        }
    }
    warnings
}

fn review_twitter(text: &str, limits: &PostKitLimits) -> Vec<String> {
    let mut warnings = Vec::new();
    let tweets: Vec<&str> = text.lines().filter_map(tweet_body).collect();
    if tweets.len() < limits.twitter_min_tweets || tweets.len() > limits.twitter_max_tweets {
        warnings.push(format!(
            "Twitter thread has {} tweets (expected {}-{})",
            tweets.len(),
            limits.twitter_min_tweets,
            limits.twitter_max_tweets
        ));
    }
    for (i, tweet) in tweets.iter().enumerate() {
        let chars = tweet.chars().count();
        if chars > limits.twitter_max_chars_per_tweet {
            warnings.push(format!(
                "Tweet {} is {} characters (max {})",
                i + 1,
                chars,
                limits.twitter_max_chars_per_tweet
            ));
        }
    }
    let hashtags = text
        .lines()
        .find_map(|line| line.trim().strip_prefix("Hashtags:"))
        .map(|tags| tags.split(',').filter(|t| !t.trim().is_empty()).count())
        .unwrap_or(0);
    if hashtags > limits.twitter_max_hashtags {
        warnings.push(format!(
            "Twitter thread has {} hashtags (max {})",
            hashtags, limits.twitter_max_hashtags
        ));
    }
    warnings
}

/// Body of a numbered tweet line such as `3. text` or `3/ text`.
fn tweet_body(line: &str) -> Option<&str> {
    let line = line.trim();
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return None;
    }
    let body = rest
        .strip_prefix('.')
        .or_else(|| rest.strip_prefix('/'))?
        .trim();
    (!body.is_empty()).then_some(body)
}
