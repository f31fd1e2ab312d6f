//! Cache stats and cleanup command handler.

use anyhow::{Context, Result};

use vidscribe::cache::LlmCache;
use vidscribe::config::Config;

use super::CacheAction;

/// Handle `vidscribe cache` subcommands.
pub(crate) fn cmd_cache(config: &Config, action: CacheAction) -> Result<()> {
    let cache = LlmCache::new(&config.cache).with_context(|| {
        format!(
            "Failed to open LLM cache at {}",
            config.cache.cache_dir.display()
        )
    })?;

    match action {
        CacheAction::Stats => {
            let usage = cache.disk_usage();
            println!("{:<16} {}", "Directory", cache.dir().display());
            println!(
                "{:<16} {}",
                "Enabled",
                if config.cache.enabled { "yes" } else { "no" }
            );
            println!("{:<16} {} days", "TTL", cache.ttl().num_days());
            println!("{:<16} {}", "Entries", usage.files);
            println!("{:<16} {}", "Size", human_bytes(usage.bytes));
            println!("{:<16} {}", "Memory limit", cache.memory_capacity());
        }
        CacheAction::ClearExpired => {
            let removed = cache.clear_expired();
            println!("Removed {} expired cache entries.", removed);
        }
        CacheAction::Purge => {
            let removed = cache.purge();
            println!("Removed {} cache entries.", removed);
        }
    }

    Ok(())
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
