//! Directory-backed result cache, one JSON document per fingerprint.

use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::{CacheEntry, ResultCache};
use crate::core::Fingerprint;
use crate::errors::CacheError;

/// Persists entries across processes. Writes go to a temporary file that is
/// renamed into place, so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct FileResultCache {
    dir: PathBuf,
}

impl FileResultCache {
    /// Opens (and creates if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.as_str()))
    }

    async fn read(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        let raw = match tokio::fs::read_to_string(self.path_for(fingerprint)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| CacheError::Corrupt {
                fingerprint: fingerprint.to_string(),
                reason: err.to_string(),
            })
    }
}

#[async_trait]
impl ResultCache for FileResultCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        match self.read(fingerprint).await? {
            Some(entry) if entry.is_expired() => {
                debug!(fingerprint = fingerprint.short(), "Evicting stale cache file");
                match tokio::fs::remove_file(self.path_for(fingerprint)).await {
                    Err(err) if err.kind() != IoErrorKind::NotFound => return Err(err.into()),
                    _ => {}
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        if let Ok(Some(existing)) = self.read(&entry.fingerprint).await {
            if !existing.is_expired() {
                return Ok(());
            }
        }

        let target = self.path_for(&entry.fingerprint);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", entry.fingerprint.as_str(), Uuid::new_v4()));
        let body = serde_json::to_vec(&entry).map_err(|err| CacheError::Corrupt {
            fingerprint: entry.fingerprint.to_string(),
            reason: err.to_string(),
        })?;

        tokio::fs::write(&tmp, body).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;
    use std::time::Duration;

    fn entry(provider: &str, ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(
            Fingerprint::from_hex("0123abcd"),
            StageKind::Visuals,
            provider,
            "{\"assets\":[]}",
            Duration::from_secs(ttl_secs),
        )
    }

    #[tokio::test]
    async fn test_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResultCache::open(dir.path()).await.unwrap();

        cache.put(entry("pexels", 60)).await.unwrap();
        let hit = cache.get(&Fingerprint::from_hex("0123abcd")).await.unwrap().unwrap();
        assert_eq!(hit.provider, "pexels");
        assert_eq!(hit.payload, "{\"assets\":[]}");
        assert!(dir.path().join("0123abcd.json").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileResultCache::open(dir.path())
            .await
            .unwrap()
            .put(entry("pexels", 60))
            .await
            .unwrap();

        let reopened = FileResultCache::open(dir.path()).await.unwrap();
        assert!(reopened
            .get(&Fingerprint::from_hex("0123abcd"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_entry_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResultCache::open(dir.path()).await.unwrap();
        assert!(cache.get(&Fingerprint::from_hex("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResultCache::open(dir.path()).await.unwrap();
        cache.put(entry("first", 60)).await.unwrap();
        cache.put(entry("second", 60)).await.unwrap();

        let hit = cache.get(&Fingerprint::from_hex("0123abcd")).await.unwrap().unwrap();
        assert_eq!(hit.provider, "first");
    }

    #[tokio::test]
    async fn test_stale_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResultCache::open(dir.path()).await.unwrap();
        cache.put(entry("pexels", 0)).await.unwrap();

        assert!(cache.get(&Fingerprint::from_hex("0123abcd")).await.unwrap().is_none());
        assert!(!dir.path().join("0123abcd.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileResultCache::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("0123abcd.json"), "not json")
            .await
            .unwrap();

        let err = cache.get(&Fingerprint::from_hex("0123abcd")).await.unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }
}
