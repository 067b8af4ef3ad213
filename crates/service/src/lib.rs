//! Registry core: service storage, TTL caching, registration tokens and
//! the registration/unregistration orchestration.
//! - Stores and the token cipher sit behind traits and are injected by
//!   construction; there is no ambient state.
//! - Token failures never surface to callers; store failures propagate.

pub mod cache;
pub mod errors;
pub mod registry;
pub mod store;
pub mod token;

pub use errors::RegistryError;
pub use registry::ServiceRegistry;
