//! In-process result cache.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CacheEntry, CacheStats, ResultCache};
use crate::core::Fingerprint;
use crate::errors::CacheError;

/// Concurrent in-memory cache with lazy eviction.
#[derive(Debug, Default)]
pub struct InMemoryResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryResultCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every stale entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    /// Lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let found = self.entries.get(fingerprint).map(|e| e.value().clone());
        match found {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry))
            }
            Some(_) => {
                self.entries.remove_if(fingerprint, |_, e| e.is_expired());
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        match self.entries.entry(entry.fingerprint.clone()) {
            Entry::Occupied(mut existing) if existing.get().is_expired() => {
                existing.insert(entry);
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        Ok(())
    }
}
