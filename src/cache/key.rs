//! Content-addressed cache keys.
//!
//! A key is the SHA-256 digest of `{"m": model, "v": prompt_version, "i": inputs}`
//! serialized as canonical JSON (object keys sorted at every nesting level), so
//! the same logical request always maps to the same key regardless of the order
//! in which the caller built its input mapping.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::CacheError;

/// Hex-encoded SHA-256 digest identifying one `(model, prompt_version, inputs)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request.
    ///
    /// Fails only when `inputs` cannot be represented as JSON (for example a map
    /// with non-string keys). That is a bug at the call site, so the error is
    /// returned instead of being absorbed like storage faults.
    pub fn derive<I>(model: &str, prompt_version: &str, inputs: &I) -> Result<Self, CacheError>
    where
        I: Serialize + ?Sized,
    {
        let inputs = serde_json::to_value(inputs)?;
        let mut payload = Map::new();
        payload.insert("m".to_string(), Value::String(model.to_string()));
        payload.insert("v".to_string(), Value::String(prompt_version.to_string()));
        payload.insert("i".to_string(), inputs);

        let bytes = serde_json::to_vec(&canonicalize(Value::Object(payload)))?;
        let digest = Sha256::digest(&bytes);
        Ok(Self(hex::encode(digest)))
    }

    /// Wrap an existing digest, e.g. a file stem read back from the cache directory.
    ///
    /// Returns `None` unless `hex` is exactly 64 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }

    /// File name of the disk record for this key.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuild `value` so every object lists its keys in lexicographic order.
///
/// `serde_json::Map` is only sorted when the `preserve_order` feature is off,
/// and any crate in the graph can turn it on, so the order is imposed here.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
