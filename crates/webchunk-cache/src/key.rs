//! C13 cache key derivation: `{stage}:{sha256(normalized_url+options_hash)[:16]}`.

use sha2::{Digest, Sha256};

pub fn cache_key(stage: &str, normalized_url: &str, options_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(options_hash.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    format!("{stage}:{}", &hex[..16])
}

/// Stable hash of a serde-serializable options struct, for composing into
/// [`cache_key`]. Field order in the serialized form must be deterministic;
/// callers pass a struct, not a `HashMap`, to guarantee that.
pub fn options_hash<T: serde::Serialize>(options: &T) -> String {
    let json = serde_json::to_string(options).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    hex::encode(hasher.finalize())
}
