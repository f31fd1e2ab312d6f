//! File-per-key persistence for cached LLM responses.
//!
//! Each record lives at `<cache_dir>/<key>.json`. Reads never fail: a record
//! that cannot be parsed, lacks `expires_at`/`response`, or whose `response`
//! is not a JSON object is deleted and reported as [`DiskRead::Corrupted`], so
//! the next lookup misses cleanly instead of tripping over the same file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CacheError, CacheKey, CachedResponse};

/// Prefix of in-flight temp files; never matches a `<key>.json` record.
const TEMP_PREFIX: &str = ".rec-";

/// Temp files older than this are leftovers of an interrupted write.
const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// A cached response with its provenance, as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheRecord {
    pub model: String,
    pub prompt_version: String,
    pub response: CachedResponse,
    /// Estimated USD cost of the call this record saves.
    pub cost: f64,
    /// Seconds the original call took.
    pub time_saved: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// On-disk shape before validation. Only `expires_at` and `response` are required.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    model: String,
    #[serde(default)]
    prompt_version: String,
    response: Value,
    // Provenance only; a null or missing value must not make the record unreadable.
    #[serde(default)]
    cost: Option<f64>,
    #[serde(default)]
    time_saved: Option<f64>,
    #[serde(default)]
    created_at: Option<String>,
    expires_at: String,
}

/// Outcome of reading one key from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum DiskRead {
    Hit(CacheRecord),
    Missing,
    /// The record had expired and was deleted.
    Expired,
    /// The record was unreadable or malformed and was deleted.
    Corrupted,
}

/// Number of record files and their combined size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub files: usize,
    pub bytes: u64,
}

/// Directory of JSON cache records, one file per key.
#[derive(Debug, Clone)]
pub struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    /// Open the tier, creating `dir` and its parents if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read the record for `key`, deleting it if expired or corrupted.
    pub fn read(&self, key: &CacheKey) -> DiskRead {
        self.read_at(key, Utc::now())
    }

    pub(crate) fn read_at(&self, key: &CacheKey, now: DateTime<Utc>) -> DiskRead {
        let path = self.path_for(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return DiskRead::Missing,
            Err(e) => {
                warn!(key = %key.short(), error = %e, "Failed to read cache file");
                return DiskRead::Missing;
            }
        };

        let record = match parse_record(&data) {
            Ok(record) => record,
            Err(reason) => {
                warn!(key = %key.short(), %reason, "Cache file corrupted, deleting");
                remove_quietly(&path);
                return DiskRead::Corrupted;
            }
        };

        if now > record.expires_at {
            debug!(key = %key.short(), "Cache entry expired, deleting");
            remove_quietly(&path);
            return DiskRead::Expired;
        }

        DiskRead::Hit(record)
    }

    /// Write `record` for `key`, atomically replacing any previous file.
    pub fn write(&self, key: &CacheKey, record: &CacheRecord) -> io::Result<()> {
        let data = serde_json::to_vec_pretty(record).map_err(io::Error::other)?;
        // Same directory as the target so the final rename never crosses filesystems.
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    /// Delete the record for `key`. Deleting a missing record is not an error.
    pub fn delete(&self, key: &CacheKey) -> bool {
        remove_quietly(&self.path_for(key))
    }

    /// Delete every expired or unparseable record. Returns the number deleted.
    ///
    /// Temp files abandoned by an interrupted write are removed as well but
    /// are not part of the count.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub(crate) fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        self.remove_stale_temp_files(SystemTime::now());
        let mut deleted = 0;
        for path in self.record_files() {
            let stale = match fs::read(&path) {
                Ok(data) => match parse_record(&data) {
                    Ok(record) => now > record.expires_at,
                    Err(_) => true,
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => false,
                Err(_) => true,
            };
            if stale && remove_quietly(&path) {
                deleted += 1;
            }
        }
        if deleted > 0 {
            info!(count = deleted, "Cleared expired cache files");
        }
        deleted
    }

    /// Delete every record regardless of expiry. Returns the number deleted.
    pub fn purge(&self) -> usize {
        let deleted = self
            .record_files()
            .into_iter()
            .filter(|path| remove_quietly(path))
            .count();
        if deleted > 0 {
            info!(count = deleted, "Purged cache files");
        }
        deleted
    }

    pub fn usage(&self) -> DiskUsage {
        self.record_files()
            .iter()
            .filter_map(|path| fs::metadata(path).ok())
            .fold(DiskUsage::default(), |acc, meta| DiskUsage {
                files: acc.files + 1,
                bytes: acc.bytes + meta.len(),
            })
    }

    /// Remove `.rec-*.tmp` files last modified more than [`STALE_TEMP_AGE`] before `now`.
    fn remove_stale_temp_files(&self, now: SystemTime) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        let removed = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(".tmp"))
            })
            .filter(|entry| {
                entry
                    .metadata()
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| now.duration_since(modified).ok())
                    .is_some_and(|age| age > STALE_TEMP_AGE)
            })
            .filter(|entry| remove_quietly(&entry.path()))
            .count();
        if removed > 0 {
            debug!(count = removed, "Removed abandoned cache temp files");
        }
        removed
    }

    fn record_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list cache directory");
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect()
    }
}

fn parse_record(data: &[u8]) -> Result<CacheRecord, String> {
    let raw: RawRecord = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    let Value::Object(response) = raw.response else {
        return Err("response is not a JSON object".to_string());
    };
    let expires_at = parse_timestamp(&raw.expires_at)
        .ok_or_else(|| format!("invalid expires_at '{}'", raw.expires_at))?;
    let created_at = raw
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(expires_at);
    Ok(CacheRecord {
        model: raw.model,
        prompt_version: raw.prompt_version,
        response,
        cost: raw.cost.unwrap_or(0.0),
        time_saved: raw.time_saved.unwrap_or(0.0),
        created_at,
        expires_at,
    })
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as local time.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Remove `path`, returning whether a file was actually deleted.
fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to delete cache file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;
    use tempfile::TempDir;

    fn key(name: &str) -> CacheKey {
        CacheKey::derive("m", "v", &json!({ "name": name })).unwrap()
    }

    fn record(ttl: TimeDelta) -> CacheRecord {
        let now = Utc::now();
        let mut response = CachedResponse::new();
        response.insert("text".into(), json!("hello"));
        CacheRecord {
            model: "sonnet".into(),
            prompt_version: "v1".into(),
            response,
            cost: 0.05,
            time_saved: 2.5,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    fn json_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
            .count()
    }

    #[test]
    fn test_open_creates_nested_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a").join("b").join("cache");
        assert!(!dir.exists());
        let tier = DiskTier::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(tier.dir(), dir.as_path());
    }

    #[test]
    fn test_write_then_read() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let rec = record(TimeDelta::days(7));
        tier.write(&key("a"), &rec).unwrap();
        match tier.read(&key("a")) {
            DiskRead::Hit(read) => {
                assert_eq!(read.response, rec.response);
                assert_eq!(read.model, "sonnet");
                assert_eq!(read.cost, 0.05);
                assert_eq!(read.time_saved, 2.5);
                assert_eq!(read.expires_at, rec.expires_at);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_file_layout() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();
        let data = fs::read_to_string(tier.path_for(&key("a"))).unwrap();
        let value: Value = serde_json::from_str(&data).unwrap();
        for field in [
            "model",
            "prompt_version",
            "response",
            "cost",
            "time_saved",
            "created_at",
            "expires_at",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["response"]["text"], "hello");
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_key() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        assert_eq!(tier.read(&key("nope")), DiskRead::Missing);
    }

    #[test]
    fn test_expired_record_deleted_on_read() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let rec = record(TimeDelta::zero());
        tier.write(&key("a"), &rec).unwrap();
        let later = rec.expires_at + TimeDelta::milliseconds(1);
        assert_eq!(tier.read_at(&key("a"), later), DiskRead::Expired);
        assert!(!tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_invalid_json_deleted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        fs::write(tier.path_for(&key("a")), "{ invalid json }").unwrap();
        assert_eq!(tier.read(&key("a")), DiskRead::Corrupted);
        assert!(!tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_non_utf8_file_deleted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        fs::write(tier.path_for(&key("a")), [0xff, 0xfe, 0x7b, 0x00, 0xc3]).unwrap();
        assert_eq!(tier.read(&key("a")), DiskRead::Corrupted);
        assert!(!tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_null_provenance_still_readable() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let expires = (Utc::now() + TimeDelta::days(1)).to_rfc3339();
        let data = json!({
            "response": {"text": "kept"},
            "cost": null,
            "time_saved": null,
            "expires_at": expires,
        });
        fs::write(tier.path_for(&key("a")), data.to_string()).unwrap();
        match tier.read(&key("a")) {
            DiskRead::Hit(rec) => {
                assert_eq!(rec.response["text"], "kept");
                assert_eq!(rec.cost, 0.0);
                assert_eq!(rec.time_saved, 0.0);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_fields_deleted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        fs::write(tier.path_for(&key("a")), r#"{"model": "test"}"#).unwrap();
        assert_eq!(tier.read(&key("a")), DiskRead::Corrupted);
        assert!(!tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_non_object_response_deleted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let expires = (Utc::now() + TimeDelta::days(1)).to_rfc3339();
        let data = json!({"response": "not a dict", "expires_at": expires});
        fs::write(tier.path_for(&key("a")), data.to_string()).unwrap();
        assert_eq!(tier.read(&key("a")), DiskRead::Corrupted);
        assert!(!tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_bad_timestamp_deleted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let data = json!({"response": {"text": "x"}, "expires_at": "next tuesday"});
        fs::write(tier.path_for(&key("a")), data.to_string()).unwrap();
        assert_eq!(tier.read(&key("a")), DiskRead::Corrupted);
    }

    #[test]
    fn test_legacy_naive_timestamp_accepted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let expires = (Local::now() + TimeDelta::days(1))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        let data = json!({
            "model": "sonnet",
            "prompt_version": "v1.0",
            "response": {"text": "legacy"},
            "cost": 0.01,
            "time_saved": 1.0,
            "created_at": expires,
            "expires_at": expires,
        });
        fs::write(tier.path_for(&key("a")), data.to_string()).unwrap();
        match tier.read(&key("a")) {
            DiskRead::Hit(rec) => assert_eq!(rec.response["text"], "legacy"),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_idempotent() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(1))).unwrap();
        assert!(tier.delete(&key("a")));
        assert!(!tier.delete(&key("a")));
    }

    #[test]
    fn test_sweep_counts_expired_and_corrupted() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        for name in ["e1", "e2", "e3"] {
            tier.write(&key(name), &record(TimeDelta::zero())).unwrap();
        }
        for name in ["l1", "l2"] {
            tier.write(&key(name), &record(TimeDelta::days(7))).unwrap();
        }
        fs::write(tier.path_for(&key("bad")), "not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let later = Utc::now() + TimeDelta::seconds(1);
        assert_eq!(tier.sweep_expired_at(later), 4);
        assert_eq!(json_files(tmp.path()), 2);
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_sweep_removes_abandoned_temp_files() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        let old = tmp.path().join(".rec-abandoned.tmp");
        let fresh = tmp.path().join(".rec-inflight.tmp");
        fs::write(&old, "partial").unwrap();
        fs::write(&fresh, "partial").unwrap();
        fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(2 * 60 * 60))
            .unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();

        assert_eq!(tier.sweep_expired(), 0);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(tier.path_for(&key("a")).exists());
    }

    #[test]
    fn test_sweep_keeps_live_records() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();
        tier.write(&key("b"), &record(TimeDelta::days(7))).unwrap();
        assert_eq!(tier.sweep_expired(), 0);
        assert_eq!(json_files(tmp.path()), 2);
    }

    #[test]
    fn test_purge_and_usage() {
        let tmp = TempDir::new().unwrap();
        let tier = DiskTier::open(tmp.path()).unwrap();
        assert_eq!(tier.usage(), DiskUsage::default());
        tier.write(&key("a"), &record(TimeDelta::days(7))).unwrap();
        tier.write(&key("b"), &record(TimeDelta::days(7))).unwrap();
        let usage = tier.usage();
        assert_eq!(usage.files, 2);
        assert!(usage.bytes > 0);
        assert_eq!(tier.purge(), 2);
        assert_eq!(tier.usage().files, 0);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2026-01-02T03:04:05Z").is_some());
        assert!(parse_timestamp("2026-01-02T03:04:05.123456+02:00").is_some());
        assert!(parse_timestamp("2026-01-02T03:04:05.123456").is_some());
        assert!(parse_timestamp("2026-01-02T03:04:05").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
