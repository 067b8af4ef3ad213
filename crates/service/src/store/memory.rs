use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use models::Service;
use tokio::sync::RwLock;

use crate::errors::RegistryError;
use crate::store::ServiceStore;

/// In-memory reference implementation of [`ServiceStore`].
pub struct InMemoryServiceStore {
    services: RwLock<HashMap<String, Service>>,
}

impl InMemoryServiceStore {
    /// Creates a store seeded with the given services.
    /// Fails when the set contains duplicate service ids.
    pub fn new(services: Vec<Service>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for service in &services {
            if !seen.insert(service.service_id.clone()) {
                return Err(RegistryError::Validation(format!(
                    "services must not contain duplicate ids: {}",
                    service.service_id
                )));
            }
        }
        let map = services
            .into_iter()
            .map(|s| (s.service_id.clone(), s))
            .collect();
        Ok(Self { services: RwLock::new(map) })
    }

    /// Creates an empty store.
    pub fn empty() -> Self {
        Self { services: RwLock::new(HashMap::new()) }
    }
}

#[async_trait]
impl ServiceStore for InMemoryServiceStore {
    async fn find_by_service_id(&self, service_id: &str) -> Result<Option<Service>, RegistryError> {
        let services = self.services.read().await;
        Ok(services.get(service_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Service>, RegistryError> {
        let services = self.services.read().await;
        let mut all: Vec<Service> = services.values().cloned().collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        Ok(all)
    }

    async fn store(&self, service: Service) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        services.insert(service.service_id.clone(), service);
        Ok(())
    }

    async fn remove(&self, service_id: &str) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        services.remove(service_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: &str, endpoint: &str) -> Service {
        Service {
            service_id: id.to_string(),
            display_name: format!("Service {id}"),
            endpoints: vec![endpoint.parse().unwrap()],
            ip_addresses: Vec::new(),
            public_urls: Vec::new(),
        }
    }

    #[tokio::test]
    async fn seeds_and_finds_services() -> Result<(), anyhow::Error> {
        let store = InMemoryServiceStore::new(vec![
            service("api-1", "http://host1:5000/"),
            service("api-2", "http://host2:5000/"),
        ])?;

        let found = store.find_by_service_id("api-1").await?;
        assert_eq!(found.unwrap().service_id, "api-1");
        assert!(store.find_by_service_id("unknown").await?.is_none());
        Ok(())
    }

    #[test]
    fn rejects_duplicate_service_ids() {
        let result = InMemoryServiceStore::new(vec![
            service("api-1", "http://host1:5000/"),
            service("api-1", "http://host2:5000/"),
        ]);
        assert!(matches!(result, Err(RegistryError::Validation(_))));
    }

    #[tokio::test]
    async fn store_upserts_by_service_id() -> Result<(), anyhow::Error> {
        let store = InMemoryServiceStore::empty();
        store.store(service("api-1", "http://host1:5000/")).await?;
        store.store(service("api-1", "http://host2:5000/")).await?;

        let all = store.get_all().await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].endpoints[0].as_str(), "http://host2:5000/");
        Ok(())
    }

    #[tokio::test]
    async fn remove_is_noop_for_unknown_id() -> Result<(), anyhow::Error> {
        let store = InMemoryServiceStore::empty();
        store.store(service("api-1", "http://host1:5000/")).await?;
        store.remove("unknown").await?;
        store.remove("api-1").await?;
        store.remove("api-1").await?;
        assert!(store.get_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn get_all_is_sorted_by_service_id() -> Result<(), anyhow::Error> {
        let store = InMemoryServiceStore::empty();
        store.store(service("b-api", "http://host2:5000/")).await?;
        store.store(service("a-api", "http://host1:5000/")).await?;

        let ids: Vec<String> = store.get_all().await?.into_iter().map(|s| s.service_id).collect();
        assert_eq!(ids, vec!["a-api", "b-api"]);
        Ok(())
    }
}
