//! Swarm ingress router
//!
//! Hostname routing core for the ingress front end.
//!
//! This service:
//! - Polls service discovery for the full set of routable hostnames
//! - Keeps an atomically swapped hostname -> service table
//! - Decides proxy / redirect / reject for each (hostname, TLS) pair
//! - Selects the TLS certificate to present for each SNI hostname

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swarm_ingress::{discovery, CertificateResolver, Config, Router, SharedRouter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to INGRESS_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting swarm ingress router");
    info!(
        discovery_url = %config.discovery_url,
        poll_interval = ?config.poll_interval,
        once = config.once,
        default_certificate_configured = config.default_certificate.is_some(),
        "Configuration loaded"
    );

    let router: SharedRouter = Arc::new(Router::new(CertificateResolver::new(
        config.default_certificate.clone(),
    )));

    // Resolved once here; handshakes reuse the cached result.
    if router.table().certificates().resolve_default().is_none() {
        warn!("No default certificate available; hosts without their own certificate cannot serve TLS");
    }

    discovery::run_discovery_loop(&config, router).await
}
