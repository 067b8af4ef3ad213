use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use models::Service;

use crate::cache::Cache;
use crate::errors::RegistryError;
use crate::store::ServiceStore;

/// Caching decorator for a [`ServiceStore`].
///
/// Single-key lookups are cached with the configured TTL; `get_all` always
/// bypasses the cache so a full listing never serves entries staled by
/// concurrent single-key writes.
pub struct CachingServiceStore {
    inner: Arc<dyn ServiceStore>,
    cache: Arc<dyn Cache<Service>>,
    ttl: Duration,
}

impl CachingServiceStore {
    pub fn new(inner: Arc<dyn ServiceStore>, cache: Arc<dyn Cache<Service>>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl ServiceStore for CachingServiceStore {
    async fn find_by_service_id(&self, service_id: &str) -> Result<Option<Service>, RegistryError> {
        if let Some(hit) = self.cache.get(service_id).await {
            return Ok(Some(hit));
        }

        let found = self.inner.find_by_service_id(service_id).await?;
        if let Some(service) = &found {
            self.cache.set(service_id, service.clone(), self.ttl).await;
        }
        Ok(found)
    }

    async fn get_all(&self) -> Result<Vec<Service>, RegistryError> {
        self.inner.get_all().await
    }

    async fn store(&self, service: Service) -> Result<(), RegistryError> {
        // A concurrent read between the invalidation and the re-populate
        // below can re-cache the previous value for one TTL. Known window,
        // accepted; the registry serializes mutations itself.
        let key = service.service_id.clone();
        self.cache.remove(&key).await;
        self.inner.store(service.clone()).await?;
        self.cache.set(&key, service, self.ttl).await;
        Ok(())
    }

    async fn remove(&self, service_id: &str) -> Result<(), RegistryError> {
        self.inner.remove(service_id).await?;
        self.cache.remove(service_id).await;
        Ok(())
    }
}
