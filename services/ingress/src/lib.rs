pub mod certificate;
pub mod config;
pub mod discovery;
pub mod router;
pub mod service;
pub mod table;
pub mod tls;

pub use certificate::{CertificateError, CertificateMaterial, CertificateResolver};
pub use config::Config;
pub use discovery::DiscoveryError;
pub use router::{CertificateResolution, Router, RoutingAction, SharedRouter, REDIRECT_STATUS};
pub use service::{KeyMaterial, ServiceDescriptor, ServiceSpec};
pub use table::RoutingTable;
pub use tls::{server_config, SniCertResolver};
