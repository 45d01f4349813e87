//! rustls integration for SNI certificate selection.
//!
//! The TLS listener owns the handshake; this module only plugs the router
//! into rustls. The certificate is chosen from the ClientHello's SNI name on
//! every handshake, so table updates take effect for new connections without
//! rebuilding the server config.

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use tracing::{debug, warn};

use crate::router::{CertificateResolution, SharedRouter};

/// Certificate resolver backed by the routing table.
///
/// Returning `None` aborts the handshake. That happens for ClientHellos
/// without SNI, for unknown hostnames, and for known hostnames with no usable
/// certificate.
#[derive(Debug)]
pub struct SniCertResolver {
    router: SharedRouter,
}

impl SniCertResolver {
    pub fn new(router: SharedRouter) -> Self {
        Self { router }
    }
}

impl ResolvesServerCert for SniCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let Some(server_name) = client_hello.server_name() else {
            debug!("ClientHello without SNI");
            return None;
        };

        match self.router.resolve_certificate(server_name) {
            CertificateResolution::Certificate(certified) => Some(certified),
            CertificateResolution::UnknownHost => None,
            CertificateResolution::Unavailable => {
                warn!(
                    hostname = %server_name,
                    "No certificate available for known hostname, aborting handshake"
                );
                None
            }
        }
    }
}

/// Build a server config that selects certificates through the router.
pub fn server_config(router: SharedRouter) -> Result<Arc<ServerConfig>, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(SniCertResolver::new(router)));

    Ok(Arc::new(config))
}
