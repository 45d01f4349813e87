//! TLS certificate parsing and the process-wide default certificate.
//!
//! Certificates arrive as PEM text: from discovery for individual services,
//! and from process configuration for the default. Both are turned into a
//! [`CertifiedKey`] that rustls can present during the handshake.
//!
//! Parse failures never propagate past this module as faults. A service with
//! unusable material simply has no certificate of its own, and the router
//! falls back to the default.

use std::io::{self, BufReader};
use std::sync::{Arc, OnceLock};

use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use rustls_pemfile::{certs, private_key};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::service::{KeyMaterial, ServiceSpec};

/// Reasons certificate material cannot be used.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// Certificate or key payload is empty.
    #[error("certificate material is empty")]
    Empty,

    /// PEM framing or base64 content is malformed.
    #[error("invalid PEM: {0}")]
    Pem(#[from] io::Error),

    /// No certificate block found.
    #[error("no certificate found in PEM")]
    NoCertificate,

    /// No private key block found.
    #[error("no private key found in PEM")]
    NoPrivateKey,

    /// Key type not supported by the signing provider.
    #[error("unsupported private key: {0}")]
    UnsupportedKey(#[source] rustls::Error),

    /// Private key does not belong to the leaf certificate.
    #[error("private key does not match certificate: {0}")]
    KeyMismatch(#[source] rustls::Error),
}

/// A PEM certificate chain and its private key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub certificate: String,
    pub key: KeyMaterial,
}

impl CertificateMaterial {
    pub fn new(certificate: impl Into<String>, key: impl Into<KeyMaterial>) -> Self {
        Self {
            certificate: certificate.into(),
            key: key.into(),
        }
    }

    pub fn parse(&self) -> Result<CertifiedKey, CertificateError> {
        parse_certified_key(self.certificate.as_bytes(), self.key.as_bytes())
    }
}

/// Parse a PEM certificate chain and private key into a [`CertifiedKey`].
///
/// The chain must contain at least one certificate (leaf first) and the key
/// must match the leaf.
pub fn parse_certified_key(
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<CertifiedKey, CertificateError> {
    if cert_pem.trim_ascii().is_empty() || key_pem.trim_ascii().is_empty() {
        return Err(CertificateError::Empty);
    }

    let mut cert_reader = BufReader::new(cert_pem);
    let chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader).collect::<Result<_, _>>()?;
    if chain.is_empty() {
        return Err(CertificateError::NoCertificate);
    }

    let mut key_reader = BufReader::new(key_pem);
    let key = private_key(&mut key_reader)?.ok_or(CertificateError::NoPrivateKey)?;

    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
        .map_err(CertificateError::UnsupportedKey)?;

    let certified = CertifiedKey::new(chain, signing_key);
    certified.keys_match().map_err(CertificateError::KeyMismatch)?;

    Ok(certified)
}

/// Turns raw certificate material into usable TLS certificates.
///
/// Holds the default certificate material supplied by configuration. The
/// default is parsed on first use and the outcome, success or failure, is
/// kept for the rest of the process lifetime.
#[derive(Debug, Default)]
pub struct CertificateResolver {
    default_material: Option<CertificateMaterial>,
    default_certificate: OnceLock<Option<Arc<CertifiedKey>>>,
}

impl CertificateResolver {
    pub fn new(default_material: Option<CertificateMaterial>) -> Self {
        Self {
            default_material,
            default_certificate: OnceLock::new(),
        }
    }

    /// Resolver with no default certificate configured.
    pub fn without_default() -> Self {
        Self::new(None)
    }

    /// Parse the certificate carried by a service record.
    ///
    /// Returns `None` when the record has no material or the material is
    /// unusable. Every call parses afresh from the record's raw fields.
    pub fn parse_certificate(&self, spec: &ServiceSpec) -> Option<Arc<CertifiedKey>> {
        if spec.certificate.trim().is_empty() || spec.key.is_empty() {
            debug!(hostname = %spec.hostname, "No certificate material for service");
            return None;
        }

        match parse_certified_key(spec.certificate.as_bytes(), spec.key.as_bytes()) {
            Ok(certified) => Some(Arc::new(certified)),
            Err(e) => {
                warn!(
                    hostname = %spec.hostname,
                    error = %e,
                    "Failed to parse service certificate"
                );
                None
            }
        }
    }

    /// The process-wide fallback certificate, if configured and valid.
    pub fn resolve_default(&self) -> Option<Arc<CertifiedKey>> {
        self.default_certificate
            .get_or_init(|| self.load_default())
            .clone()
    }

    pub fn has_default_material(&self) -> bool {
        self.default_material.is_some()
    }

    fn load_default(&self) -> Option<Arc<CertifiedKey>> {
        let Some(material) = &self.default_material else {
            debug!("No default certificate configured");
            return None;
        };

        match material.parse() {
            Ok(certified) => {
                info!(
                    chain_length = certified.cert.len(),
                    "Default certificate loaded"
                );
                Some(Arc::new(certified))
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse default certificate");
                None
            }
        }
    }
}
