use std::sync::Arc;

use service::ServiceRegistry;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct ServerState {
    pub registry: Arc<ServiceRegistry>,
}
