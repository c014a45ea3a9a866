/*!
Test Harness pour l'agent Cassandra Ring

Facilite l'écriture de tests de cycle avec:
- Ring simulé monté en une ligne par hôte
- Sink d'enregistrement branché automatiquement
- Assertions sur les métriques poussées
*/

use crate::catalog::HostCatalog;
use crate::jmx_stub::{FakeConnector, HostBehavior, RecordingSink, StaticRing};
use anyhow::Result;
use cassandra_ring::{CassandraRing, CycleError, CycleOutcome, CycleSettings, FailurePolicy, MetricValue, ValueType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Harness de test complet pour un cycle de collecte
pub struct TestHarness {
    pub connector: Arc<FakeConnector>,
    pub sink: Arc<RecordingSink>,
    pub settings: CycleSettings,
    ring: StaticRing,
}

impl TestHarness {
    /// Crée un harness sur un ring vide
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            connector: Arc::new(FakeConnector::new()),
            sink: Arc::new(RecordingSink::new()),
            settings: CycleSettings {
                name: "test ring".to_string(),
                discovery_host: "seed".to_string(),
                jmx_port: 8778,
                connect_timeout: Duration::from_millis(200),
                collect_timeout: Duration::from_millis(500),
                max_concurrent_hosts: 4,
                on_query_failure: FailurePolicy::AbortHost,
            },
            ring: StaticRing::Hosts(Vec::new()),
        }
    }

    /// Ajoute un hôte au ring, dans l'ordre de découverte
    pub fn host(mut self, host: &str, behavior: HostBehavior) -> Self {
        self.connector.set_host(host, behavior);
        if let StaticRing::Hosts(hosts) = &mut self.ring {
            hosts.push(host.to_string());
        }
        self
    }

    /// Raccourci: hôte sain avec le catalogue complet
    pub fn healthy_host(self, host: &str) -> Self {
        self.host(host, HostBehavior::Serve(HostCatalog::healthy()))
    }

    pub fn down_host(self, host: &str) -> Self {
        self.host(host, HostBehavior::Refuse)
    }

    /// Remplace la réponse de découverte
    pub fn discovery(mut self, ring: StaticRing) -> Self {
        self.ring = ring;
        self
    }

    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.settings.on_query_failure = policy;
        self
    }

    /// Ring prêt à poller, branché sur les stubs du harness
    pub fn ring(&self) -> CassandraRing {
        CassandraRing::new(
            self.settings.clone(),
            Arc::new(self.ring.clone()),
            self.connector.clone(),
            self.sink.clone(),
        )
    }

    /// Exécute un cycle complet
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let outcome = self.ring().poll_cycle().await;
        match &outcome {
            Ok(o) => log::info!(
                "🔄 Cycle done: {} hosts, {} down, {} pushed",
                o.state.total_hosts,
                o.state.down_count,
                o.report.pushed
            ),
            Err(e) => log::warn!("💥 Cycle failed: {}", e),
        }
        outcome
    }

    /// Dernière valeur poussée pour ce nom
    pub fn value_of(&self, name: &str) -> Option<MetricValue> {
        self.sink.last_value(name)
    }

    /// Assert qu'une métrique a été poussée avec cette valeur
    pub fn assert_metric(&self, name: &str, expected: MetricValue) -> Result<()> {
        match self.value_of(name) {
            Some(actual) if actual == expected => {
                log::info!("✅ {} = {}", name, expected);
                Ok(())
            }
            Some(actual) => anyhow::bail!("Metric '{}' mismatch: expected {}, got {}", name, expected, actual),
            None => anyhow::bail!("Metric not pushed: {}", name),
        }
    }

    /// Assert qu'aucune métrique de ce nom n'a été poussée
    pub fn assert_absent(&self, name: &str) -> Result<()> {
        if let Some(value) = self.value_of(name) {
            anyhow::bail!("Metric '{}' should not be pushed, got {}", name, value);
        }
        Ok(())
    }

    /// Noms poussés commençant par `prefix`, dans l'ordre de push
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.sink
            .names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    /// Stats sur les métriques collectées
    pub fn get_stats(&self) -> TestStats {
        let reported = self.sink.reported();
        let mut unit_counts = HashMap::new();

        for metric in &reported {
            *unit_counts.entry(metric.unit).or_insert(0) += 1;
        }

        TestStats {
            total_metrics: reported.len(),
            unit_counts,
            opened_connections: self.connector.opened_connections(),
            closed_connections: self.connector.closed_connections(),
        }
    }

    /// Vide le sink entre deux cycles
    pub fn reset(&self) {
        self.sink.clear();
        log::info!("🧹 Test harness reset");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_metrics: usize,
    pub unit_counts: HashMap<ValueType, usize>,
    pub opened_connections: usize,
    pub closed_connections: usize,
}

impl TestStats {
    pub fn print(&self) {
        println!("📊 Test Statistics:");
        println!("  Total metrics: {}", self.total_metrics);
        println!("  Metrics per unit:");
        for (unit, count) in &self.unit_counts {
            println!("    {}: {} metrics", unit, count);
        }
        println!("  Connections: {} opened, {} closed", self.opened_connections, self.closed_connections);
    }
}

/// Macro pour écrire un test de cycle sur un harness préparé
#[macro_export]
macro_rules! cycle_test {
    ($name:ident, $harness:ident = $setup:expr => $body:block) => {
        #[tokio::test]
        async fn $name() {
            let $harness: $crate::test_utils::TestHarness = $setup;

            let result = async { $body Ok::<(), $crate::anyhow::Error>(()) }.await;
            match result {
                Ok(_) => {
                    $harness.get_stats().print();
                    println!("✅ Test '{}' passed", stringify!($name));
                }
                Err(e) => {
                    eprintln!("❌ Test '{}' failed: {}", stringify!($name), e);
                    panic!("Test failed: {}", e);
                }
            }
        }
    };
}
