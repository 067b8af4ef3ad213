//! Startup/shutdown hook that registers the registry itself as a service.
//!
//! Only the registry's `register`/`unregister` operations are used; the
//! returned token is held for the lifetime of the process and spent on
//! graceful shutdown.

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;

use anyhow::{Context, Result};
use configs::SelfRegisterConfig;
use models::ServiceRegistration;
use service::ServiceRegistry;
use tracing::{info, warn};
use url::Url;

/// Registers this process in its own store. Returns the unregistration
/// token, or `None` when self-registration is disabled.
pub async fn register(
    registry: &Arc<ServiceRegistry>,
    cfg: &SelfRegisterConfig,
    bound: SocketAddr,
) -> Result<Option<String>> {
    if !cfg.enabled {
        return Ok(None);
    }

    let registration = build_registration(cfg, bound)?;
    registration
        .validate()
        .map_err(|e| anyhow::anyhow!("self-registration is invalid: {e}"))?;

    let token = registry
        .register(registration)
        .await
        .context("self-registration failed")?;
    info!(service_id = %cfg.service_id, "registry registered itself");
    Ok(Some(token))
}

/// Withdraws the self-registration on shutdown. Failures are logged, not
/// propagated; the process is exiting either way.
pub async fn unregister(registry: &Arc<ServiceRegistry>, token: &str) {
    match registry.unregister(token).await {
        Ok(()) => info!("registry unregistered itself"),
        Err(e) => warn!(error = %e, "self-unregistration failed"),
    }
}

fn build_registration(cfg: &SelfRegisterConfig, bound: SocketAddr) -> Result<ServiceRegistration> {
    let ip = local_ipv4();

    let endpoints = if cfg.endpoints.is_empty() {
        vec![derived_endpoint(bound, ip)?]
    } else {
        parse_urls(&cfg.endpoints).context("self_register.endpoints")?
    };
    let public_urls = parse_urls(&cfg.public_urls).context("self_register.public_urls")?;

    Ok(ServiceRegistration {
        service_id: cfg.service_id.clone(),
        display_name: cfg.display_name.clone(),
        endpoints,
        ip_address: ip.map(|ip| ip.to_string()),
        public_urls,
    })
}

/// The announced endpoint when none is configured: the bound port on the
/// machine address, since "0.0.0.0" or "127.0.0.1" is useless to peers.
fn derived_endpoint(bound: SocketAddr, ip: Option<IpAddr>) -> Result<Url> {
    let host = match ip {
        Some(ip) => ip.to_string(),
        None => bound.ip().to_string(),
    };
    Url::parse(&format!("http://{}:{}/", host, bound.port()))
        .context("derived self-registration endpoint")
}

fn parse_urls(values: &[String]) -> Result<Vec<Url>> {
    values
        .iter()
        .map(|v| Url::parse(v).with_context(|| format!("invalid url: {v}")))
        .collect()
}

/// Routable IPv4 of this machine, discovered by a connectionless UDP probe.
/// No packet is sent; connect() only selects the outgoing interface.
fn local_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
