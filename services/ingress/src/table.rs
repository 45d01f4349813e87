//! Routing table.
//!
//! Maps hostnames to service descriptors. The whole table is replaced on
//! every discovery update:
//! - Exact hostname match only
//! - Duplicate hostnames within one update: the later record wins
//! - Updates are applied atomically; readers see the old table or the new
//!   one, never a mix
//! - Readers never block on a writer

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};

use crate::certificate::CertificateResolver;
use crate::service::{ServiceDescriptor, ServiceSpec};

/// Immutable snapshot of the table for lock-free reads.
#[derive(Debug, Default)]
struct TableSnapshot {
    by_hostname: HashMap<String, Arc<ServiceDescriptor>>,
}

impl TableSnapshot {
    /// Build a snapshot, parsing each service's certificate.
    fn from_services(
        services: impl IntoIterator<Item = ServiceSpec>,
        certificates: &CertificateResolver,
    ) -> Self {
        let mut by_hostname = HashMap::new();

        for spec in services {
            info!(
                hostname = %spec.hostname,
                upstream = %spec.upstream_address,
                secure = spec.secure,
                force_tls = spec.force_tls,
                "Registering service"
            );

            let descriptor = ServiceDescriptor::new(spec, certificates);
            let hostname = descriptor.hostname().to_string();
            if by_hostname
                .insert(hostname.clone(), Arc::new(descriptor))
                .is_some()
            {
                debug!(hostname = %hostname, "Duplicate hostname, later record replaces earlier");
            }
        }

        Self { by_hostname }
    }
}

/// Hostname to service descriptor mapping.
///
/// Uses ArcSwap for lock-free atomic replacement. Readers load the current
/// snapshot; the writer builds a complete new snapshot off to the side and
/// swaps the pointer in one store.
#[derive(Debug)]
pub struct RoutingTable {
    /// Atomically swappable table snapshot.
    snapshot: ArcSwap<TableSnapshot>,
    certificates: Arc<CertificateResolver>,
}

impl RoutingTable {
    /// Create a new empty routing table.
    pub fn new(certificates: Arc<CertificateResolver>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(TableSnapshot::default()),
            certificates,
        }
    }

    /// Replace the table with a new set of services.
    ///
    /// Certificate failures are logged and leave the affected service
    /// installed without a certificate. Existing readers keep the snapshot
    /// they loaded until they finish with it.
    pub fn update_table(&self, services: impl IntoIterator<Item = ServiceSpec>) {
        let new_snapshot = Arc::new(TableSnapshot::from_services(services, &self.certificates));
        let service_count = new_snapshot.by_hostname.len();

        self.snapshot.store(new_snapshot);

        info!(service_count, "Routing table updated atomically");
    }

    /// Look up the descriptor for a hostname.
    pub fn lookup(&self, hostname: &str) -> Option<Arc<ServiceDescriptor>> {
        let snapshot = self.snapshot.load();
        snapshot.by_hostname.get(hostname).cloned()
    }

    /// Resolver used to parse certificates on update.
    pub fn certificates(&self) -> &CertificateResolver {
        &self.certificates
    }

    /// Get the number of services in the table.
    pub fn len(&self) -> usize {
        self.snapshot.load().by_hostname.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot.load().by_hostname.is_empty()
    }

    /// All hostnames in the current table, sorted.
    pub fn hostnames(&self) -> Vec<String> {
        let snapshot = self.snapshot.load();
        let mut hostnames: Vec<String> = snapshot.by_hostname.keys().cloned().collect();
        hostnames.sort();
        hostnames
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(Arc::new(CertificateResolver::without_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_service(hostname: &str, upstream: &str) -> ServiceSpec {
        ServiceSpec::new(hostname, upstream).with_tls(true, false)
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = RoutingTable::default();

        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.lookup("a.example.com").is_none());
    }

    #[test]
    fn test_update_and_lookup() {
        let table = RoutingTable::default();
        table.update_table(vec![
            make_service("a.example.com", "http://10.0.0.1:8080"),
            make_service("b.example.com", "http://10.0.0.2:8080"),
        ]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.hostnames(), vec!["a.example.com", "b.example.com"]);

        let a = table.lookup("a.example.com").unwrap();
        assert_eq!(a.upstream_address(), "http://10.0.0.1:8080");
        assert!(table.lookup("c.example.com").is_none());
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let table = RoutingTable::default();
        table.update_table(vec![make_service("a.example.com", "http://10.0.0.1:8080")]);

        assert!(table.lookup("A.EXAMPLE.COM").is_none());
        assert!(table.lookup("a.example.com.").is_none());
        assert!(table.lookup("example.com").is_none());
    }

    #[test]
    fn test_update_replaces_not_merges() {
        let table = RoutingTable::default();
        table.update_table(vec![
            make_service("a.example.com", "http://10.0.0.1:8080"),
            make_service("b.example.com", "http://10.0.0.2:8080"),
        ]);
        table.update_table(vec![make_service("c.example.com", "http://10.0.0.3:8080")]);

        assert!(table.lookup("a.example.com").is_none());
        assert!(table.lookup("b.example.com").is_none());
        assert!(table.lookup("c.example.com").is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_duplicate_hostname_last_wins() {
        let table = RoutingTable::default();
        table.update_table(vec![
            make_service("a.example.com", "http://first:8080"),
            make_service("a.example.com", "http://second:8080"),
        ]);

        assert_eq!(table.len(), 1);
        let a = table.lookup("a.example.com").unwrap();
        assert_eq!(a.upstream_address(), "http://second:8080");
    }

    #[test]
    fn test_update_with_empty_set_clears_table() {
        let table = RoutingTable::default();
        table.update_table(vec![make_service("a.example.com", "http://10.0.0.1:8080")]);
        table.update_table(Vec::new());

        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_certificate_still_installed() {
        let table = RoutingTable::default();
        table.update_table(vec![make_service("a.example.com", "http://10.0.0.1:8080")
            .with_certificate("not a certificate", "not a key")]);

        let a = table.lookup("a.example.com").unwrap();
        assert!(!a.has_certificate());
        assert_eq!(a.upstream_address(), "http://10.0.0.1:8080");
    }

    #[test]
    fn test_held_descriptor_survives_update() {
        let table = RoutingTable::default();
        table.update_table(vec![make_service("a.example.com", "http://old:8080")]);

        let held = table.lookup("a.example.com").unwrap();
        table.update_table(vec![make_service("a.example.com", "http://new:8080")]);

        assert_eq!(held.upstream_address(), "http://old:8080");
        assert_eq!(
            table.lookup("a.example.com").unwrap().upstream_address(),
            "http://new:8080"
        );
    }

    #[test]
    fn test_readers_never_observe_mixed_generations() {
        const HOSTS: usize = 64;

        fn generation(tag: &str) -> Vec<ServiceSpec> {
            (0..HOSTS)
                .map(|i| {
                    make_service(&format!("host-{i}.example.com"), &format!("http://{tag}/{i}"))
                })
                .collect()
        }

        let table = RoutingTable::default();
        table.update_table(generation("gen-a"));

        std::thread::scope(|s| {
            s.spawn(|| {
                for round in 0..200 {
                    let tag = if round % 2 == 0 { "gen-b" } else { "gen-a" };
                    table.update_table(generation(tag));
                }
            });

            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..500 {
                        let snapshot = table.snapshot.load();
                        assert_eq!(snapshot.by_hostname.len(), HOSTS);

                        let tags: std::collections::HashSet<&str> = snapshot
                            .by_hostname
                            .values()
                            .map(|d| d.upstream_address().split('/').nth(2).unwrap_or_default())
                            .collect();
                        assert_eq!(tags.len(), 1, "snapshot mixed generations: {tags:?}");
                    }
                });
            }
        });
    }
}
