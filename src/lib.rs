//! vidscribe: LLM stages of a video transcription pipeline, fronted by a
//! content-addressed response cache.
//!
//! The [`cache`] module holds the two-tier cache, [`providers`] the Claude CLI
//! provider and the cache-aware call wrapper, and [`stages`] the prompts for
//! summaries, translations and social post kits.

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod stages;

pub use cache::{CacheKey, CacheStats, LlmCache, Savings};
pub use config::Config;
pub use error::{Result, ScribeError};
