use serde::{Deserialize, Serialize};
use url::Url;

/// A registered service: a named endpoint set under a unique identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Unique service identifier.
    pub service_id: String,
    /// Human-readable name of the service.
    #[serde(default)]
    pub display_name: String,
    /// The urls the service is reachable on. Non-empty while the service
    /// is live; a removal that empties this list deletes the service.
    pub endpoints: Vec<Url>,
    /// The ip addresses of the machines the service instances run on.
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Consumer-facing urls (e.g. the public load-balanced url). Reads
    /// fall back to `endpoints` when nothing is registered here.
    #[serde(default)]
    pub public_urls: Vec<Url>,
}
