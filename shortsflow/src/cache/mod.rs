//! Content-addressed result cache.
//!
//! Entries map a request [`Fingerprint`] to the serialized artifact a
//! provider produced for it. Entries are never mutated: they are inserted
//! once and evicted when found expired.

mod file;
mod memory;

pub use file::FileResultCache;
pub use memory::InMemoryResultCache;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Fingerprint, StageKind};
use crate::errors::CacheError;

/// A stored provider result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request fingerprint.
    pub fingerprint: Fingerprint,
    /// The stage that produced the artifact.
    pub stage: StageKind,
    /// The provider that produced the artifact.
    pub provider: String,
    /// The artifact as JSON.
    pub payload: String,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Time to live in seconds.
    pub ttl_secs: u64,
}

impl CacheEntry {
    /// Creates an entry stamped now.
    pub fn new(
        fingerprint: Fingerprint,
        stage: StageKind,
        provider: impl Into<String>,
        payload: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            fingerprint,
            stage,
            provider: provider.into(),
            payload: payload.into(),
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// When the entry stops being fresh.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        let secs = i64::from(u32::try_from(self.ttl_secs).unwrap_or(u32::MAX));
        self.created_at + ChronoDuration::seconds(secs)
    }

    /// Returns true if the entry is stale at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Returns true if the entry is stale.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Lookup counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    /// Fresh entries returned.
    pub hits: u64,
    /// Lookups that found nothing fresh.
    pub misses: u64,
    /// Entries currently stored, including not-yet-evicted stale ones.
    pub entries: usize,
}

/// Storage backend for provider results.
///
/// Implementations must tolerate concurrent use. A second `put` for a
/// fingerprint that already holds a fresh entry keeps the first entry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Returns the fresh entry for `fingerprint`, if any.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    /// Stores an entry.
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(
            Fingerprint::from_hex("ab12"),
            StageKind::Voice,
            "tts",
            "{}",
            Duration::from_secs(ttl_secs),
        )
    }

    #[test]
    fn test_entry_expiry() {
        let fresh = entry(60);
        assert!(!fresh.is_expired());
        assert!(fresh.is_expired_at(fresh.created_at + ChronoDuration::seconds(60)));
        assert!(!fresh.is_expired_at(fresh.created_at + ChronoDuration::seconds(59)));
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        assert!(entry(0).is_expired());
    }

    #[test]
    fn test_entry_roundtrip() {
        let original = entry(30);
        let json = serde_json::to_string(&original).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
