//! Blake3 hashing utilities.
//!
//! Used to derive stable, filesystem-safe names for cached channel data.

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// Stable 16 character key for a (channel URL, subdir) pair
pub fn cache_key(channel: &str, subdir: &str) -> String {
    let mut key = blake3_hash(format!("{}|{}", channel.trim_end_matches('/'), subdir).as_bytes());
    key.truncate(16);
    key
}
