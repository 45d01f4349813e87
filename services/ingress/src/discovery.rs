//! Service discovery feed.
//!
//! Polls the discovery endpoint for the full list of services and installs
//! it in the routing table. Each response is a complete table, never a
//! delta. When discovery is unreachable the current table stays in place.

use anyhow::Result;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::router::SharedRouter;
use crate::service::ServiceSpec;

/// Errors fetching the service list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Request could not be sent or the response could not be read.
    #[error("discovery request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("discovery query failed (status={status}): {body}")]
    Status { status: StatusCode, body: String },

    /// Response body is not a list of services.
    #[error("invalid discovery response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Fetch the current list of services.
pub async fn fetch_services(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<ServiceSpec>, DiscoveryError> {
    let resp = client.get(url).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(DiscoveryError::Status { status, body });
    }

    resp.json::<Vec<ServiceSpec>>()
        .await
        .map_err(DiscoveryError::Decode)
}

/// Poll discovery and keep the router's table current.
///
/// The table is only replaced when the service list changes. Fetch failures
/// are logged and retried after the poll interval.
pub async fn run_discovery_loop(config: &Config, router: SharedRouter) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("swarm-ingress/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut applied: Option<Vec<ServiceSpec>> = None;

    loop {
        match fetch_services(&client, &config.discovery_url).await {
            Ok(services) => {
                if applied.as_ref() == Some(&services) {
                    debug!(service_count = services.len(), "Service list unchanged");
                } else {
                    info!(service_count = services.len(), "Applying service list");
                    router.update_table(services.clone());
                    applied = Some(services);
                }

                if config.once {
                    info!(service_count = router.table().len(), "Discovery sync complete");
                    return Ok(());
                }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    url = %config.discovery_url,
                    "Failed to fetch services; retrying"
                );
            }
        }

        tokio::time::sleep(config.poll_interval).await;
    }
}
