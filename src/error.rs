//! Error types for vidscribe.

use crate::cache::CacheError;

/// Top-level error for library operations.
#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The LLM provider cannot be used as configured (e.g. CLI not installed).
    #[error("LLM provider not configured: {0}")]
    ProviderConfig(String),

    /// The LLM provider call failed (non-zero exit, timeout, empty output).
    #[error("LLM provider error: {0}")]
    Provider(String),

    /// A stage was handed input it cannot work with (e.g. an empty transcript).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result alias using [`ScribeError`].
pub type Result<T> = std::result::Result<T, ScribeError>;
