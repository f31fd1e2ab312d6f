//! Summarize, translate and post-kit command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use vidscribe::cache::LlmCache;
use vidscribe::config::Config;
use vidscribe::providers::{CachedLlm, ClaudeCliProvider, LlmOutput, LlmProvider};
use vidscribe::stages::{
    generate_post_kit, localize_post_kit, summarize, translate, Platform, PostKitRequest,
    SummaryRequest, TranslationRequest,
};

/// Handle `vidscribe summarize`.
pub(crate) async fn cmd_summarize(
    config: &Config,
    no_cache: bool,
    transcript: &Path,
    title: &str,
    language: &str,
    model: Option<String>,
) -> Result<()> {
    let transcript = read_input(transcript)?;
    let llm = build_llm(config, no_cache)?;
    let model = model.unwrap_or_else(|| config.llm.summarizer_model.clone());

    let output = summarize(
        &llm,
        &model,
        &SummaryRequest {
            title,
            transcript: &transcript,
            language,
        },
    )
    .await
    .context("Summarization failed")?;
    emit(&model, &output);
    Ok(())
}

/// Handle `vidscribe translate`.
pub(crate) async fn cmd_translate(
    config: &Config,
    no_cache: bool,
    input: &Path,
    to: &str,
    model: Option<String>,
) -> Result<()> {
    let text = read_input(input)?;
    let llm = build_llm(config, no_cache)?;
    let model = model.unwrap_or_else(|| config.llm.translator_model.clone());

    let output = translate(
        &llm,
        &model,
        &TranslationRequest {
            text: &text,
            target_language: to,
        },
    )
    .await
    .context("Translation failed")?;
    emit(&model, &output);
    Ok(())
}

/// Handle `vidscribe post-kit`.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_post_kit(
    config: &Config,
    no_cache: bool,
    summary: &Path,
    title: &str,
    platform: Platform,
    language: &str,
    model: Option<String>,
    translate_to: Option<&str>,
) -> Result<()> {
    let summary = read_input(summary)?;
    let llm = build_llm(config, no_cache)?;
    let model = model.unwrap_or_else(|| config.llm.post_kits_model.clone());

    let kit = generate_post_kit(
        &llm,
        &model,
        &PostKitRequest {
            platform,
            title,
            summary: &summary,
            language,
        },
        &config.post_kits,
    )
    .await
    .with_context(|| format!("Failed to generate {} post kit", platform))?;

    let Some(target) = translate_to else {
        emit(&model, &kit.output);
        for warning in &kit.warnings {
            eprintln!("review: {}", warning);
        }
        return Ok(());
    };

    let translator = &config.llm.translator_model;
    let kit = localize_post_kit(&llm, translator, kit, target, &config.post_kits).await;
    println!("{}", kit.text());
    eprintln!("{}", provenance_note(&model, &kit.output));
    match &kit.translated {
        Some(translated) => eprintln!("{}", provenance_note(translator, translated)),
        None => eprintln!("translation to {} failed; printed the original", target),
    }
    for warning in &kit.warnings {
        eprintln!("review: {}", warning);
    }
    Ok(())
}

/// Provider from config, fronted by the response cache unless disabled.
fn build_llm(config: &Config, no_cache: bool) -> Result<CachedLlm> {
    let provider = ClaudeCliProvider::from_config(&config.llm);
    if !provider.is_available() {
        warn!(
            cli = %config.llm.cli_path,
            "Claude CLI not found on PATH; only cached responses will succeed"
        );
    }
    let provider: Arc<dyn LlmProvider> = Arc::new(provider);

    if no_cache || !config.cache.enabled {
        return Ok(CachedLlm::uncached(provider));
    }
    let cache = LlmCache::new(&config.cache).with_context(|| {
        format!(
            "Failed to open LLM cache at {}",
            config.cache.cache_dir.display()
        )
    })?;
    Ok(CachedLlm::new(provider, Some(Arc::new(cache))))
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Generated text to stdout, a one-line provenance note to stderr.
fn emit(model: &str, output: &LlmOutput) {
    println!("{}", output.text);
    eprintln!("{}", provenance_note(model, output));
}

fn provenance_note(model: &str, output: &LlmOutput) -> String {
    if output.from_cache {
        format!("[{}] served from cache", model)
    } else {
        format!(
            "[{}] generated in {:.1}s, est. ${:.4}",
            model,
            output.elapsed.as_secs_f64(),
            output.cost
        )
    }
}
