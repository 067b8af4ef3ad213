use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ModelError;

/// One registration call contributing endpoints/ip/public urls to a service.
///
/// The registration is both the merge input and, verbatim, the payload of
/// the unregistration token: the token represents this contribution, not
/// the merged service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    pub service_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub endpoints: Vec<Url>,
    /// Ip address of the machine this instance runs on; blank means absent.
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub public_urls: Vec<Url>,
}

impl ServiceRegistration {
    /// Checks the invariants the registry relies on: a non-blank service id
    /// and at least one endpoint. Callers (the HTTP layer, the bootstrap)
    /// run this before handing the registration to the registry.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.service_id.trim().is_empty() {
            return Err(ModelError::Validation("serviceId must not be empty".into()));
        }
        if self.endpoints.is_empty() {
            return Err(ModelError::Validation("endpoints must not be empty".into()));
        }
        Ok(())
    }

    /// The ip address with blanks treated as absent.
    pub fn ip(&self) -> Option<&str> {
        match self.ip_address.as_deref() {
            Some(ip) if !ip.trim().is_empty() => Some(ip),
            _ => None,
        }
    }
}
