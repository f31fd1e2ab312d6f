//! Two-tier LLM response cache.
//!
//! Lookups try the in-memory LRU tier first and fall back to the per-key JSON
//! files under `cache_dir`, promoting disk hits into memory. Writes go to disk
//! first and then refresh memory. Storage faults are logged and absorbed: a
//! cache miss only costs another LLM call, so nothing here may fail a pipeline
//! run except an unencodable cache key.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;

use super::disk::{CacheRecord, DiskRead, DiskTier, DiskUsage};
use super::memory::MemoryTier;
use super::{CacheError, CacheKey, CachedResponse};

/// Longest TTL honored; larger configured values are clamped to it.
pub const MAX_TTL_DAYS: u32 = 36_500;

/// Provenance recorded alongside a cached response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Savings {
    /// Estimated USD cost of the call.
    pub cost: f64,
    /// Wall-clock seconds the call took.
    pub time_saved: f64,
}

impl Savings {
    pub fn new(cost: f64, time_saved: f64) -> Self {
        Self { cost, time_saved }
    }
}

/// LLM response cache with a memory tier in front of a disk tier.
pub struct LlmCache {
    disk: DiskTier,
    memory: Mutex<MemoryTier>,
    ttl: TimeDelta,
    cleanup_probability: f64,
    counters: Counters,
}

impl LlmCache {
    /// Open the cache described by `config`, creating the directory if needed.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let disk = DiskTier::open(&config.cache_dir)?;
        let cleanup_probability = if config.cleanup_probability.is_finite() {
            config.cleanup_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ttl_days = if config.ttl_days > MAX_TTL_DAYS {
            warn!(
                ttl_days = config.ttl_days,
                max = MAX_TTL_DAYS,
                "Cache TTL too large, clamping"
            );
            MAX_TTL_DAYS
        } else {
            config.ttl_days
        };
        debug!(
            dir = %config.cache_dir.display(),
            ttl_days,
            max_mem_cache_size = config.max_mem_cache_size,
            "LLM cache initialized"
        );
        Ok(Self {
            disk,
            memory: Mutex::new(MemoryTier::new(config.max_mem_cache_size)),
            ttl: TimeDelta::days(i64::from(ttl_days)),
            cleanup_probability,
            counters: Counters::default(),
        })
    }

    /// Open a cache at `dir` with the given TTL and default limits.
    pub fn open(dir: impl AsRef<Path>, ttl_days: u32) -> Result<Self, CacheError> {
        Self::new(&CacheConfig {
            cache_dir: dir.as_ref().to_path_buf(),
            ttl_days,
            ..CacheConfig::default()
        })
    }

    /// Look up the response cached for `(model, prompt_version, inputs)`.
    pub fn get<I>(
        &self,
        model: &str,
        prompt_version: &str,
        inputs: &I,
    ) -> Result<Option<CachedResponse>, CacheError>
    where
        I: Serialize + ?Sized,
    {
        let key = CacheKey::derive(model, prompt_version, inputs)?;
        Ok(self.lookup(&key))
    }

    /// Cache `response` for `(model, prompt_version, inputs)`.
    pub fn set<I>(
        &self,
        model: &str,
        prompt_version: &str,
        inputs: &I,
        response: CachedResponse,
        savings: Savings,
    ) -> Result<(), CacheError>
    where
        I: Serialize + ?Sized,
    {
        let key = CacheKey::derive(model, prompt_version, inputs)?;
        self.store(&key, model, prompt_version, response, savings);
        Ok(())
    }

    /// Look up an already-derived key.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let cached = self.memory().get(key);
        if let Some(value) = cached {
            self.counters.bump(&self.counters.memory_hits);
            debug!(key = %key.short(), "Memory cache hit");
            return Some(value);
        }

        self.counters.bump(&self.counters.disk_reads);
        match self.disk.read(key) {
            DiskRead::Hit(record) => {
                self.counters.bump(&self.counters.disk_hits);
                info!(
                    key = %key.short(),
                    cost = %format!("${:.4}", record.cost),
                    time_saved = %format!("{:.1}s", record.time_saved),
                    "Disk cache hit, reusing response"
                );
                let evicted = self.memory().put(
                    key.clone(),
                    record.response.clone(),
                    record.expires_at,
                );
                if evicted.is_some() {
                    self.counters.bump(&self.counters.evictions);
                }
                Some(record.response)
            }
            DiskRead::Missing => {
                self.counters.bump(&self.counters.misses);
                None
            }
            DiskRead::Expired => {
                self.counters.bump(&self.counters.expired);
                self.counters.bump(&self.counters.misses);
                None
            }
            DiskRead::Corrupted => {
                self.counters.bump(&self.counters.corrupted);
                self.counters.bump(&self.counters.misses);
                None
            }
        }
    }

    /// Store a response under an already-derived key.
    ///
    /// A failed disk write is logged and the value is still kept in memory for
    /// the rest of this process.
    pub fn store(
        &self,
        key: &CacheKey,
        model: &str,
        prompt_version: &str,
        response: CachedResponse,
        savings: Savings,
    ) {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(now);
        let record = CacheRecord {
            model: model.to_string(),
            prompt_version: prompt_version.to_string(),
            response,
            cost: finite_or_zero(savings.cost),
            time_saved: finite_or_zero(savings.time_saved),
            created_at: now,
            expires_at,
        };

        match self.disk.write(key, &record) {
            Ok(()) => {
                self.counters.bump(&self.counters.writes);
                debug!(
                    key = %key.short(),
                    expires = %expires_at.format("%Y-%m-%d %H:%M"),
                    "Cache saved"
                );
            }
            Err(e) => {
                self.counters.bump(&self.counters.write_failures);
                warn!(key = %key.short(), error = %e, "Failed to save cache, keeping in memory only");
            }
        }

        let evicted = self.memory().put(key.clone(), record.response, expires_at);
        if evicted.is_some() {
            self.counters.bump(&self.counters.evictions);
        }

        if self.should_sweep() {
            self.clear_expired();
        }
    }

    /// Delete expired and corrupted disk records. Memory entries expire lazily.
    pub fn clear_expired(&self) -> usize {
        let deleted = self.disk.sweep_expired();
        self.counters
            .swept
            .fetch_add(deleted as u64, Ordering::Relaxed);
        deleted
    }

    /// Drop every entry from both tiers. Returns the number of files deleted.
    pub fn purge(&self) -> usize {
        self.memory().clear();
        self.disk.purge()
    }

    /// Drop every memory entry, leaving disk records in place.
    pub fn clear_memory(&self) {
        self.memory().clear();
    }

    pub fn memory_len(&self) -> usize {
        self.memory().len()
    }

    pub fn memory_capacity(&self) -> usize {
        self.memory().capacity()
    }

    pub fn disk_usage(&self) -> DiskUsage {
        self.disk.usage()
    }

    pub fn dir(&self) -> &Path {
        self.disk.dir()
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Counters accumulated since this cache was opened.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    // -- private helpers ---------------------------------------------------

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        // The tier holds no invariants a panicking holder could break halfway.
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_sweep(&self) -> bool {
        self.cleanup_probability > 0.0 && rand::random::<f64>() < self.cleanup_probability
    }
}

/// JSON has no representation for NaN or infinity; they would be written as null.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

impl std::fmt::Debug for LlmCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmCache")
            .field("dir", &self.disk.dir())
            .field("ttl_days", &self.ttl.num_days())
            .field("cleanup_probability", &self.cleanup_probability)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    disk_reads: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    corrupted: AtomicU64,
    swept: AtomicU64,
}

impl Counters {
    fn bump(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            memory_hits: load(&self.memory_hits),
            disk_hits: load(&self.disk_hits),
            misses: load(&self.misses),
            disk_reads: load(&self.disk_reads),
            writes: load(&self.writes),
            write_failures: load(&self.write_failures),
            evictions: load(&self.evictions),
            expired: load(&self.expired),
            corrupted: load(&self.corrupted),
            swept: load(&self.swept),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered by the memory tier.
    pub memory_hits: u64,
    /// Lookups answered by the disk tier (and promoted).
    pub disk_hits: u64,
    /// Lookups answered by neither tier.
    pub misses: u64,
    /// Disk tier reads attempted after a memory miss.
    pub disk_reads: u64,
    /// Records persisted successfully.
    pub writes: u64,
    /// Records that could not be persisted.
    pub write_failures: u64,
    /// Memory entries evicted at capacity.
    pub evictions: u64,
    /// Disk records found expired on read.
    pub expired: u64,
    /// Disk records found corrupted on read.
    pub corrupted: u64,
    /// Disk records deleted by expiry sweeps.
    pub swept: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }

    /// Fraction of lookups that hit either tier, or `0.0` before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits() + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits() as f64 / lookups as f64
        }
    }
}
