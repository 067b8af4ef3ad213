use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use common::utils::logging::init_logging_default;
use dotenvy::dotenv;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use configs::RegistryConfig;
use models::Service;
use service::cache::{Cache, MokaCache};
use service::store::{CachingServiceStore, InMemoryServiceStore, ServiceStore};
use service::token::{Aes256GcmTokenCipher, RegistrationTokenProvider, TokenProvider};
use service::ServiceRegistry;

use crate::routes;
use crate::self_register;
use crate::state::ServerState;

const CACHE_MAX_CAPACITY: u64 = 10_000;

/// Initialize logging via shared common utils
fn init_logging() {
    init_logging_default();
}

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Wire the registry core from configuration: store (optionally behind the
/// caching decorator), token cipher and provider.
pub fn build_state(cfg: &RegistryConfig) -> ServerState {
    let cipher = match cfg.decoded_token_key() {
        Some(key) => Aes256GcmTokenCipher::from_key(key),
        None => {
            warn!("no registry.token_key configured; using a generated key, tokens will not survive a restart");
            Aes256GcmTokenCipher::from_key(Aes256GcmTokenCipher::generate_key())
        }
    };
    let lifespan = chrono::Duration::seconds(cfg.token_lifespan_secs as i64);
    let tokens: Arc<dyn TokenProvider> =
        Arc::new(RegistrationTokenProvider::new(Arc::new(cipher), lifespan));

    let inner: Arc<dyn ServiceStore> = Arc::new(InMemoryServiceStore::empty());
    let store: Arc<dyn ServiceStore> = if cfg.cache_enabled {
        let cache: Arc<dyn Cache<Service>> = Arc::new(MokaCache::new(CACHE_MAX_CAPACITY));
        Arc::new(CachingServiceStore::new(
            inner,
            cache,
            Duration::from_secs(cfg.cache_ttl_secs),
        ))
    } else {
        inner
    };

    ServerState { registry: Arc::new(ServiceRegistry::new(store, tokens)) }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
    }
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();

    let cfg = configs::AppConfig::load_or_default()?;
    let state = build_state(&cfg.registry);

    let app: Router = routes::build_router(build_cors(), state.clone());

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;
    info!(%bound, "starting service registry");

    let self_token = self_register::register(&state.registry, &cfg.self_register, bound).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(token) = self_token {
        self_register::unregister(&state.registry, &token).await;
    }
    Ok(())
}
