//! Routing decisions and certificate selection.
//!
//! The router is the read side used by the HTTP layer and the TLS listener.
//! Each call loads one table snapshot, so a decision is always made against a
//! single consistent version of the table.
//!
//! Decision order for a request (first match wins):
//! 1. Unknown hostname: `NotFound`
//! 2. TLS request, service does not allow TLS: `Rejected`
//! 3. TLS request, or plaintext request without forced TLS: `Proxy`
//! 4. Plaintext request with forced TLS: `Redirect` to `https://<hostname>`

use std::sync::Arc;

use rustls::sign::CertifiedKey;
use tracing::debug;

use crate::certificate::CertificateResolver;
use crate::service::ServiceSpec;
use crate::table::RoutingTable;

/// Status code used for forced-TLS redirects.
pub const REDIRECT_STATUS: u16 = 301;

/// What the HTTP layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingAction {
    /// No service registered for the hostname.
    NotFound,
    /// Service exists but does not accept TLS traffic.
    Rejected,
    /// Forward the request as-is to the upstream.
    Proxy { upstream: String },
    /// Redirect the client to the HTTPS origin.
    Redirect { target: String, status: u16 },
}

impl RoutingAction {
    /// Full `Location` value for a redirect, appending the original path and
    /// query to the target origin. `None` for every other action.
    pub fn redirect_location(&self, path_and_query: &str) -> Option<String> {
        let RoutingAction::Redirect { target, .. } = self else {
            return None;
        };

        let location = if path_and_query.is_empty() {
            format!("{target}/")
        } else if path_and_query.starts_with('/') {
            format!("{target}{path_and_query}")
        } else {
            format!("{target}/{path_and_query}")
        };
        Some(location)
    }
}

/// Outcome of certificate selection for a hostname.
#[derive(Debug, Clone)]
pub enum CertificateResolution {
    /// No service registered for the hostname; the handshake should abort.
    UnknownHost,
    /// Certificate to present.
    Certificate(Arc<CertifiedKey>),
    /// Known hostname, but neither its own nor a default certificate is
    /// usable. The listener decides how to proceed.
    Unavailable,
}

impl CertificateResolution {
    /// Whether the hostname is in the routing table.
    pub fn is_known(&self) -> bool {
        !matches!(self, CertificateResolution::UnknownHost)
    }

    pub fn certificate(&self) -> Option<&Arc<CertifiedKey>> {
        match self {
            CertificateResolution::Certificate(certified) => Some(certified),
            _ => None,
        }
    }

    pub fn into_certificate(self) -> Option<Arc<CertifiedKey>> {
        match self {
            CertificateResolution::Certificate(certified) => Some(certified),
            _ => None,
        }
    }
}

/// Routing façade over the table and the certificate resolver.
#[derive(Debug)]
pub struct Router {
    table: RoutingTable,
}

impl Router {
    /// Create a router with an empty table.
    pub fn new(certificates: CertificateResolver) -> Self {
        Self {
            table: RoutingTable::new(Arc::new(certificates)),
        }
    }

    /// Replace the routing table with a full new set of services.
    pub fn update_table(&self, services: impl IntoIterator<Item = ServiceSpec>) {
        self.table.update_table(services);
    }

    /// Decide what to do with a request for `hostname`.
    pub fn resolve(&self, hostname: &str, is_secure: bool) -> RoutingAction {
        let Some(service) = self.table.lookup(hostname) else {
            debug!(hostname = %hostname, "No service for hostname");
            return RoutingAction::NotFound;
        };

        if is_secure && !service.secure() {
            debug!(hostname = %hostname, "TLS request to service without TLS");
            return RoutingAction::Rejected;
        }

        if is_secure || !service.force_tls() {
            return RoutingAction::Proxy {
                upstream: service.upstream_address().to_string(),
            };
        }

        RoutingAction::Redirect {
            target: format!("https://{hostname}"),
            status: REDIRECT_STATUS,
        }
    }

    /// Select the certificate to present for an SNI hostname.
    pub fn resolve_certificate(&self, hostname: &str) -> CertificateResolution {
        let Some(service) = self.table.lookup(hostname) else {
            debug!(hostname = %hostname, "No service for SNI hostname");
            return CertificateResolution::UnknownHost;
        };

        if let Some(certified) = service.certificate() {
            return CertificateResolution::Certificate(Arc::clone(certified));
        }

        match self.table.certificates().resolve_default() {
            Some(certified) => CertificateResolution::Certificate(certified),
            None => {
                debug!(hostname = %hostname, "No usable certificate for hostname");
                CertificateResolution::Unavailable
            }
        }
    }

    /// Read access to the routing table.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(CertificateResolver::without_default())
    }
}

/// Shared router reference.
pub type SharedRouter = Arc<Router>;
