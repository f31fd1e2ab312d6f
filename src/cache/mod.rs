//! LLM response caching: content-addressed keys, an in-memory LRU tier and a
//! file-per-key disk tier behind a single facade.

pub mod disk;
pub mod key;
pub mod memory;
pub mod response_cache;

use std::path::PathBuf;

pub use disk::{CacheRecord, DiskRead, DiskTier, DiskUsage};
pub use key::CacheKey;
pub use memory::{MemoryTier, DEFAULT_MAX_MEM_CACHE_SIZE};
pub use response_cache::{CacheStats, LlmCache, Savings, MAX_TTL_DAYS};

/// A cached LLM response payload. Always a JSON object, normally with a `text` field.
pub type CachedResponse = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by the cache.
///
/// Storage faults during lookups and writes are absorbed and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The request inputs could not be encoded into a cache key.
    #[error("cannot encode cache key inputs: {0}")]
    KeyEncoding(#[from] serde_json::Error),

    /// The cache directory could not be created.
    #[error("cannot prepare cache directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
