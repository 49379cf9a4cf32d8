//! On-disk TTL cache for decoded upstream datasets.
//!
//! Optional: until [`init`] is called every lookup is a miss and every write
//! is dropped, so the engine runs the same with or without it.

use anyhow::{Result, anyhow};
use fjall::Keyspace;
use rand::RngExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::OnceCell;
use tokio::task;

static GLOBAL_CACHE: OnceCell<PersistentCache> = OnceCell::const_new();

#[derive(Serialize, Deserialize)]
struct StoredEntry<T> {
    value: T,
    expires_at: u64, // unix seconds
}

pub struct PersistentCache {
    store: Keyspace,
}

fn read_store(store: Keyspace, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
    Ok(store.get(key)?.map(|v| v.to_vec()))
}

fn now_secs() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

impl PersistentCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path).open()?;
        let store = db.keyspace("datasets", fjall::KeyspaceCreateOptions::default)?;
        Ok(Self { store })
    }

    #[tracing::instrument(name = "put_cache", level = "debug", skip(self, value))]
    pub async fn put<T: Serialize + Send + 'static>(
        &self,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        let expires_at = SystemTime::now()
            .checked_add(ttl)
            .ok_or(anyhow!("TTL overflow"))?
            .duration_since(UNIX_EPOCH)?
            .as_secs();
        let bytes = postcard::to_stdvec(&StoredEntry { value, expires_at })?;

        task::spawn_blocking(move || store.insert(key, bytes)).await??;
        Ok(())
    }

    /// Fresh value for `key`. Expired entries are evicted and reported as misses.
    #[tracing::instrument(name = "query_cache", level = "debug", skip(self))]
    pub async fn get<T: DeserializeOwned + Send + 'static>(&self, key: &str) -> Result<Option<T>> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();
        let Some(bytes) = task::spawn_blocking(move || read_store(store, key_bytes)).await?? else {
            tracing::debug!("Key not found");
            return Ok(None);
        };

        let entry: StoredEntry<T> = postcard::from_bytes(&bytes)?;
        if now_secs()? < entry.expires_at {
            Ok(Some(entry.value))
        } else {
            tracing::debug!("Key found but expired");
            self.remove(key).await?;
            Ok(None)
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.as_bytes().to_vec();
        let store = self.store.clone();
        task::spawn_blocking(move || store.remove(key)).await??;
        Ok(())
    }
}

pub fn init(path: impl AsRef<Path>) -> Result<()> {
    let cache = PersistentCache::open(path)?;
    GLOBAL_CACHE
        .set(cache)
        .map_err(|_| anyhow!("Cache already initialized"))?;
    Ok(())
}

pub async fn get<T: DeserializeOwned + Send + 'static>(key: &str) -> Result<Option<T>> {
    match GLOBAL_CACHE.get() {
        Some(cache) => cache.get(key).await,
        None => Ok(None),
    }
}

pub async fn put<T: Serialize + Send + 'static>(key: &str, value: T, ttl: Duration) -> Result<()> {
    match GLOBAL_CACHE.get() {
        Some(cache) => cache.put(key, value, ttl).await,
        None => Ok(()),
    }
}

/// `base` scaled by a random factor in `[0.9, 1.1)` so entries written
/// together do not all expire together.
#[must_use]
pub fn ttl_with_jitter(base: Duration) -> Duration {
    let jitter: f64 = rand::rng().random_range(0.9..1.1);
    base.mul_f64(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();
        let points = vec![GeoPoint::new(45.0, 5.0), GeoPoint::new(46.5, -1.25)];

        cache
            .put("bikes", points.clone(), Duration::from_secs(3600))
            .await
            .unwrap();
        let back: Option<Vec<GeoPoint>> = cache.get("bikes").await.unwrap();
        assert_eq!(back, Some(points));

        let missing: Option<Vec<GeoPoint>> = cache.get("chargers").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PersistentCache::open(dir.path()).unwrap();

        cache.put("stations", 7u32, Duration::ZERO).await.unwrap();
        let first: Option<u32> = cache.get("stations").await.unwrap();
        assert!(first.is_none());
        let second: Option<u32> = cache.get("stations").await.unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_ttl_jitter_bounds() {
        let base = Duration::from_secs(3600);
        for _ in 0..100 {
            let ttl = ttl_with_jitter(base);
            assert!(ttl >= Duration::from_secs(3240));
            assert!(ttl < Duration::from_secs(3960));
        }
    }
}
