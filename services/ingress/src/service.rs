//! Service descriptors.
//!
//! A [`ServiceSpec`] is the raw record delivered by discovery. A
//! [`ServiceDescriptor`] is what the routing table holds: the same record plus
//! the TLS certificate parsed from it. The certificate is parsed exactly once,
//! when the descriptor is built, and a descriptor never changes after that.

use std::fmt;
use std::sync::Arc;

use rustls::sign::CertifiedKey;
use serde::{Deserialize, Serialize};

use crate::certificate::CertificateResolver;

/// PEM-encoded private key.
///
/// `Debug` never prints the key itself.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("KeyMaterial(<empty>)")
        } else {
            f.write_str("KeyMaterial([REDACTED])")
        }
    }
}

impl From<&str> for KeyMaterial {
    fn from(pem: &str) -> Self {
        Self::new(pem)
    }
}

impl From<String> for KeyMaterial {
    fn from(pem: String) -> Self {
        Self(pem)
    }
}

/// One routable hostname as reported by discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Exact-match routing key (Host header / SNI name).
    #[serde(alias = "dns_name")]
    pub hostname: String,

    /// Backend URL to proxy to.
    #[serde(alias = "url")]
    pub upstream_address: String,

    /// Whether the hostname may be served over TLS at all.
    #[serde(default)]
    pub secure: bool,

    /// Whether plaintext requests must be redirected to HTTPS.
    #[serde(default)]
    pub force_tls: bool,

    /// PEM certificate chain, leaf first. Empty when none is configured.
    #[serde(default)]
    pub certificate: String,

    /// PEM private key for the leaf certificate.
    #[serde(default)]
    pub key: KeyMaterial,
}

impl ServiceSpec {
    /// Plaintext-only service with no TLS policy and no certificate.
    pub fn new(hostname: impl Into<String>, upstream_address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            upstream_address: upstream_address.into(),
            ..Self::default()
        }
    }

    pub fn with_tls(mut self, secure: bool, force_tls: bool) -> Self {
        self.secure = secure;
        self.force_tls = force_tls;
        self
    }

    pub fn with_certificate(
        mut self,
        certificate: impl Into<String>,
        key: impl Into<KeyMaterial>,
    ) -> Self {
        self.certificate = certificate.into();
        self.key = key.into();
        self
    }
}

/// Immutable routing and TLS policy record for one hostname.
#[derive(Clone)]
pub struct ServiceDescriptor {
    spec: ServiceSpec,
    certificate: Option<Arc<CertifiedKey>>,
}

impl ServiceDescriptor {
    /// Build a descriptor, parsing its certificate material.
    ///
    /// Unusable material leaves the descriptor without a certificate; the
    /// failure is logged by the resolver and never prevents construction.
    pub fn new(spec: ServiceSpec, certificates: &CertificateResolver) -> Self {
        let certificate = certificates.parse_certificate(&spec);
        Self { spec, certificate }
    }

    pub fn hostname(&self) -> &str {
        &self.spec.hostname
    }

    pub fn upstream_address(&self) -> &str {
        &self.spec.upstream_address
    }

    pub fn secure(&self) -> bool {
        self.spec.secure
    }

    pub fn force_tls(&self) -> bool {
        self.spec.force_tls
    }

    /// The raw record this descriptor was built from.
    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Certificate parsed from the descriptor's own material, if any.
    pub fn certificate(&self) -> Option<&Arc<CertifiedKey>> {
        self.certificate.as_ref()
    }

    pub fn has_certificate(&self) -> bool {
        self.certificate.is_some()
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("hostname", &self.spec.hostname)
            .field("upstream_address", &self.spec.upstream_address)
            .field("secure", &self.spec.secure)
            .field("force_tls", &self.spec.force_tls)
            .field("has_certificate", &self.has_certificate())
            .finish()
    }
}
