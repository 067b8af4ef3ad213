//! Domain types for the service registry.
//! - Plain serde structs shared by the core and the HTTP layer.
//! - Wire names are camelCase to match the JSON contract.

pub mod errors;
pub mod registration;
pub mod service;

pub use errors::ModelError;
pub use registration::ServiceRegistration;
pub use service::Service;
