use async_trait::async_trait;
use models::Service;

use crate::errors::RegistryError;

pub mod caching;
pub mod memory;

pub use caching::CachingServiceStore;
pub use memory::InMemoryServiceStore;

/// Trait abstraction for service storage.
/// Implementations can be in-memory, file-backed or remote; the in-memory
/// store is the reference. Mutating callers are expected to serialize their
/// read-modify-write sequences (the registry does this with a write guard).
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Finds the service registered under the given id.
    async fn find_by_service_id(&self, service_id: &str) -> Result<Option<Service>, RegistryError>;

    /// Returns all registered services.
    async fn get_all(&self) -> Result<Vec<Service>, RegistryError>;

    /// Inserts or replaces the service keyed by its service id.
    async fn store(&self, service: Service) -> Result<(), RegistryError>;

    /// Removes the service if present; a no-op otherwise.
    async fn remove(&self, service_id: &str) -> Result<(), RegistryError>;
}
