//! Configuration for vidscribe.
//!
//! Loaded from `~/.vidscribe/config.json` (every field optional), then
//! overridden field by field from `VIDSCRIBE_*` environment variables. A `.env`
//! file in the working directory is read first so it can supply those variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::DEFAULT_MAX_MEM_CACHE_SIZE;
use crate::error::{Result, ScribeError};

/// Prefix shared by every environment override.
const ENV_PREFIX: &str = "VIDSCRIBE_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub llm: LlmConfig,
    pub post_kits: PostKitLimits,
}

/// LLM response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false, every LLM call goes to the provider.
    pub enabled: bool,
    /// Directory holding one JSON record per cache key.
    pub cache_dir: PathBuf,
    /// Days a fresh entry stays valid.
    pub ttl_days: u32,
    /// Upper bound on entries held in memory.
    pub max_mem_cache_size: usize,
    /// Chance that a write triggers an expiry sweep of the cache directory.
    pub cleanup_probability: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: Config::dir().join("cache").join("llm"),
            ttl_days: 7,
            max_mem_cache_size: DEFAULT_MAX_MEM_CACHE_SIZE,
            cleanup_probability: 0.05,
        }
    }
}

/// Claude CLI invocation and per-stage model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Path or name of the `claude` executable.
    pub cli_path: String,
    /// Seconds before a CLI call is abandoned.
    pub timeout_secs: u64,
    pub default_model: String,
    pub summarizer_model: String,
    pub translator_model: String,
    pub post_kits_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            cli_path: "claude".into(),
            timeout_secs: 180,
            default_model: "sonnet".into(),
            summarizer_model: "sonnet".into(),
            translator_model: "haiku".into(),
            post_kits_model: "sonnet".into(),
        }
    }
}

/// Length and structure limits written into the post-kit prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostKitLimits {
    pub linkedin_min_chars: usize,
    pub linkedin_max_chars: usize,
    pub linkedin_min_insights: usize,
    pub linkedin_max_insights: usize,
    pub twitter_min_tweets: usize,
    pub twitter_max_tweets: usize,
    pub twitter_max_chars_per_tweet: usize,
    pub twitter_max_hashtags: usize,
}

impl Default for PostKitLimits {
    fn default() -> Self {
        Self {
            linkedin_min_chars: 800,
            linkedin_max_chars: 1200,
            linkedin_min_insights: 4,
            linkedin_max_insights: 8,
            twitter_min_tweets: 8,
            twitter_max_tweets: 12,
            twitter_max_chars_per_tweet: 280,
            twitter_max_hashtags: 3,
        }
    }
}

impl Config {
    /// Base directory: `~/.vidscribe`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vidscribe")
    }

    /// Default config file: `~/.vidscribe/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load `.env`, the default config file (if present) and env overrides.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading `path` instead of the default file.
    ///
    /// An explicit path must exist; the default path may be absent.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Self::path();
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a JSON config file without applying env overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            ScribeError::Config(format!("Failed to read config at {:?}: {}", path, e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            ScribeError::Config(format!("Failed to parse config at {:?}: {}", path, e))
        })
    }

    /// Apply `VIDSCRIBE_*` overrides using `lookup` to read variables.
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("CACHE_ENABLED") {
            set_parsed(&mut self.cache.enabled, "CACHE_ENABLED", &v);
        }
        if let Some(v) = var("CACHE_DIR") {
            self.cache.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = var("CACHE_TTL_DAYS") {
            set_parsed(&mut self.cache.ttl_days, "CACHE_TTL_DAYS", &v);
        }
        if let Some(v) = var("CACHE_MAX_MEM_SIZE") {
            set_parsed(&mut self.cache.max_mem_cache_size, "CACHE_MAX_MEM_SIZE", &v);
        }
        if let Some(v) = var("CACHE_CLEANUP_PROBABILITY") {
            set_parsed(
                &mut self.cache.cleanup_probability,
                "CACHE_CLEANUP_PROBABILITY",
                &v,
            );
        }
        if let Some(v) = var("CLAUDE_CLI_PATH") {
            self.llm.cli_path = v;
        }
        if let Some(v) = var("CLAUDE_CLI_TIMEOUT") {
            set_parsed(&mut self.llm.timeout_secs, "CLAUDE_CLI_TIMEOUT", &v);
        }
        if let Some(v) = var("DEFAULT_LLM_MODEL") {
            self.llm.default_model = v;
        }
        if let Some(v) = var("SUMMARIZER_MODEL") {
            self.llm.summarizer_model = v;
        }
        if let Some(v) = var("TRANSLATOR_MODEL") {
            self.llm.translator_model = v;
        }
        if let Some(v) = var("POST_KITS_MODEL") {
            self.llm.post_kits_model = v;
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, suffix: &str, raw: &str) {
    match raw.parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(
            variable = %format!("{ENV_PREFIX}{suffix}"),
            value = raw,
            "Ignoring invalid environment override"
        ),
    }
}
