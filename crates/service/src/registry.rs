use std::sync::Arc;

use models::{Service, ServiceRegistration};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::errors::RegistryError;
use crate::store::ServiceStore;
use crate::token::TokenProvider;

/// Registration/unregistration orchestration over a store and a token
/// provider.
///
/// Per service id, a service is either absent or registered with at least
/// one endpoint; withdrawing the last contribution removes it. Mutations
/// are serialized by a single write guard so concurrent registrations for
/// the same id cannot lose contributions in the read-modify-write.
pub struct ServiceRegistry {
    store: Arc<dyn ServiceStore>,
    tokens: Arc<dyn TokenProvider>,
    write_guard: Mutex<()>,
}

impl ServiceRegistry {
    pub fn new(store: Arc<dyn ServiceStore>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { store, tokens, write_guard: Mutex::new(()) }
    }

    /// Registers a service contribution and returns the token that later
    /// unregisters exactly this contribution.
    ///
    /// Preconditions (non-blank service id, non-empty endpoints) are
    /// enforced by the caller via [`ServiceRegistration::validate`].
    #[instrument(skip(self, registration), fields(service_id = %registration.service_id))]
    pub async fn register(&self, registration: ServiceRegistration) -> Result<String, RegistryError> {
        let _guard = self.write_guard.lock().await;

        let service = match self.store.find_by_service_id(&registration.service_id).await? {
            None => Service {
                service_id: registration.service_id.clone(),
                display_name: registration.display_name.clone(),
                endpoints: registration.endpoints.clone(),
                ip_addresses: registration.ip().map(|ip| vec![ip.to_string()]).unwrap_or_default(),
                // Verbatim on first creation; duplicates in the input survive.
                public_urls: registration.public_urls.clone(),
            },
            Some(mut service) => {
                service.endpoints.extend(registration.endpoints.iter().cloned());

                if let Some(ip) = registration.ip() {
                    service.ip_addresses.push(ip.to_string());
                }

                // Deduplicated-by-value union, but only on this merge branch.
                if !registration.public_urls.is_empty() {
                    let mut merged = Vec::new();
                    for url in service.public_urls.iter().chain(registration.public_urls.iter()) {
                        if !merged.contains(url) {
                            merged.push(url.clone());
                        }
                    }
                    service.public_urls = merged;
                }
                service
            }
        };

        self.store.store(service).await?;

        let token = self.tokens.generate(&registration).await?;
        info!(endpoints = registration.endpoints.len(), "service_registered");
        Ok(token)
    }

    /// Unregisters the contribution encoded in the token. Invalid, expired
    /// and unknown tokens are silent no-ops, indistinguishable from
    /// success.
    #[instrument(skip(self, token))]
    pub async fn unregister(&self, token: &str) -> Result<(), RegistryError> {
        let Some(registration) = self.tokens.validate(token).await else {
            debug!("unregister with invalid or expired token; nothing to do");
            return Ok(());
        };

        let _guard = self.write_guard.lock().await;

        let Some(mut service) = self.store.find_by_service_id(&registration.service_id).await? else {
            return Ok(());
        };

        // Remove one stored occurrence per endpoint in the token so
        // duplicate contributions from other registrations survive.
        for endpoint in &registration.endpoints {
            if let Some(pos) = service.endpoints.iter().position(|e| e == endpoint) {
                service.endpoints.remove(pos);
            }
        }
        if let Some(ip) = registration.ip() {
            service.ip_addresses.retain(|existing| existing != ip);
        }

        if service.endpoints.is_empty() {
            self.store.remove(&registration.service_id).await?;
            info!(service_id = %registration.service_id, "service_removed");
        } else {
            self.store.store(service).await?;
            info!(service_id = %registration.service_id, "registration_withdrawn");
        }
        Ok(())
    }

    /// Retrieves a service by id, or `None` if nothing is registered.
    pub async fn get_service(&self, service_id: &str) -> Result<Option<Service>, RegistryError> {
        let service = self.store.find_by_service_id(service_id).await?;
        Ok(service.map(ensure_public_urls))
    }

    /// Returns all registered services.
    pub async fn get_all_services(&self) -> Result<Vec<Service>, RegistryError> {
        let services = self.store.get_all().await?;
        Ok(services.into_iter().map(ensure_public_urls).collect())
    }
}

/// Publish endpoints as public urls if nothing is registered. Read-side
/// only, never persisted.
fn ensure_public_urls(mut service: Service) -> Service {
    if service.public_urls.is_empty() {
        service.public_urls = service.endpoints.clone();
    }
    service
}
