use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Trait abstraction for a keyed cache with per-entry time-to-live.
#[async_trait]
pub trait Cache<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns the cached item, or `None` if no live entry matches the key.
    async fn get(&self, key: &str) -> Option<T>;

    /// Caches the item under the key; the entry expires after `ttl`.
    async fn set(&self, key: &str, item: T, ttl: Duration);

    /// Drops the entry for the key, if any.
    async fn remove(&self, key: &str);
}

#[derive(Clone)]
struct Entry<T> {
    value: T,
    ttl: Duration,
}

/// Reads the per-entry TTL stored alongside the value.
struct PerEntryTtl;

impl<T> moka::Expiry<String, Entry<T>> for PerEntryTtl
where
    T: Clone + Send + Sync + 'static,
{
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Default cache implementation backed by a moka future cache.
pub struct MokaCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: moka::future::Cache<String, Entry<T>>,
}

impl<T> MokaCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl<T> Cache<T> for MokaCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<T> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, item: T, ttl: Duration) {
        self.inner
            .insert(key.to_string(), Entry { value: item, ttl })
            .await;
    }

    async fn remove(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
