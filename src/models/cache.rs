//! Durable cache entry model.

use serde::{Deserialize, Serialize};

/// Cached leaderboard payload.
///
/// Stored at: `leaderboard_cache/{key}`
///
/// The payload is opaque JSON; a payload that fails to decode is treated
/// as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    /// Write time (Unix seconds)
    pub stored_at: i64,
    /// Absolute expiry (Unix seconds)
    pub expires_at: i64,
    /// Baseline version the payload was computed against
    #[serde(default)]
    pub baseline_version: u32,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at
    }
}
