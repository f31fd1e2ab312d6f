//! Rough cost estimates for Claude calls.
//!
//! The CLI reports no usage, so token counts are approximated from text length
//! and priced per model family. The figure only feeds cache provenance and the
//! savings note printed after a run.

/// Characters per token used by [`estimate_tokens`].
const CHARS_PER_TOKEN: usize = 4;

/// USD prices per million tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

/// Pricing for a model alias or full model id, matched by family name.
pub fn model_pricing(model: &str) -> Option<ModelPricing> {
    let model = model.to_ascii_lowercase();
    let (input, output) = if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("sonnet") {
        (3.0, 15.0)
    } else if model.contains("haiku") {
        (1.0, 5.0)
    } else {
        return None;
    };
    Some(ModelPricing {
        input_per_mtok: input,
        output_per_mtok: output,
    })
}

/// Approximate token count of `text`, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(CHARS_PER_TOKEN) as u64
}

/// Estimated USD cost of a call, or `None` for an unknown model.
pub fn estimate_cost(model: &str, prompt_tokens: u64, completion_tokens: u64) -> Option<f64> {
    let pricing = model_pricing(model)?;
    Some(
        (prompt_tokens as f64 * pricing.input_per_mtok
            + completion_tokens as f64 * pricing.output_per_mtok)
            / 1_000_000.0,
    )
}
