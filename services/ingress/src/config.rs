//! Ingress configuration.
//!
//! Everything is read from the environment once at startup. The default
//! certificate is carried here as plain material and handed to the
//! certificate resolver; nothing reads the environment after this point.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::certificate::CertificateMaterial;

/// Ingress configuration (env-driven).
#[derive(Debug, Clone)]
pub struct Config {
    /// Discovery endpoint returning the full list of services
    /// (example: http://localhost:8080/v1/services).
    pub discovery_url: String,

    /// Interval between discovery polls.
    pub poll_interval: Duration,

    /// Exit once the first table has been applied.
    pub once: bool,

    /// Fallback certificate for hosts without a usable certificate of their own.
    pub default_certificate: Option<CertificateMaterial>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discovery_url = var("INGRESS_DISCOVERY_URL")
            .unwrap_or_else(|| "http://localhost:8080/v1/services".to_string());

        let poll_interval_ms: u64 = var("INGRESS_DISCOVERY_POLL_INTERVAL_MS")
            .map(|v| v.parse())
            .transpose()
            .context("INGRESS_DISCOVERY_POLL_INTERVAL_MS must be an integer (milliseconds).")?
            .unwrap_or(5000);
        let poll_interval = Duration::from_millis(poll_interval_ms.max(50));

        let once = var("INGRESS_DISCOVERY_ONCE")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        // certData / keyData are the names older deployments use.
        let default_cert = var("INGRESS_DEFAULT_CERT")
            .or_else(|| var("certData"))
            .filter(|v| !v.trim().is_empty());
        let default_key = var("INGRESS_DEFAULT_KEY")
            .or_else(|| var("keyData"))
            .filter(|v| !v.trim().is_empty());
        let default_certificate = match (default_cert, default_key) {
            (None, None) => None,
            (cert, key) => Some(CertificateMaterial::new(
                cert.unwrap_or_default(),
                key.unwrap_or_default(),
            )),
        };

        let log_level = var("INGRESS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            discovery_url,
            poll_interval,
            once,
            default_certificate,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.discovery_url, "http://localhost:8080/v1/services");
        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert!(!config.once);
        assert!(config.default_certificate.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("INGRESS_DISCOVERY_URL", "http://discovery:9000/services"),
            ("INGRESS_DISCOVERY_POLL_INTERVAL_MS", "250"),
            ("INGRESS_DISCOVERY_ONCE", "TRUE"),
            ("INGRESS_LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.discovery_url, "http://discovery:9000/services");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(config.once);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = load(&[("INGRESS_DISCOVERY_POLL_INTERVAL_MS", "1")]).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let err = load(&[("INGRESS_DISCOVERY_POLL_INTERVAL_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("INGRESS_DISCOVERY_POLL_INTERVAL_MS"));
    }

    #[test]
    fn test_default_certificate_material() {
        let config = load(&[
            ("INGRESS_DEFAULT_CERT", "cert-pem"),
            ("INGRESS_DEFAULT_KEY", "key-pem"),
        ])
        .unwrap();

        assert_eq!(
            config.default_certificate,
            Some(CertificateMaterial::new("cert-pem", "key-pem"))
        );
    }

    #[test]
    fn test_default_certificate_legacy_names() {
        let config = load(&[("certData", "cert-pem"), ("keyData", "key-pem")]).unwrap();

        assert_eq!(
            config.default_certificate,
            Some(CertificateMaterial::new("cert-pem", "key-pem"))
        );
    }

    #[test]
    fn test_partial_default_certificate_is_kept() {
        // The resolver reports it as unusable; configuration does not fail.
        let config = load(&[("INGRESS_DEFAULT_CERT", "cert-pem")]).unwrap();

        let material = config.default_certificate.unwrap();
        assert_eq!(material.certificate, "cert-pem");
        assert!(material.key.is_empty());
    }
}
