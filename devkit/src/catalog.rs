/*!
Catalogues MBean en mémoire pour un hôte simulé

Construit la table `ObjectName -> attribut -> valeur` qu'un `FakeConnection`
sert au collecteur:
- `HostCatalog::healthy()` couvre tout le catalogue de l'agent
- `set` / `remove` / `null` ouvrent des trous pour tester les échecs
*/

use cassandra_ring::collector::{METRICS_DOMAIN, NET_DOMAIN, REQUEST_DOMAIN};
use cassandra_ring::discovery::STORAGE_SERVICE_DOMAIN;
use cassandra_ring::{AttributeValue, LatencyUnit, ObjectName};
use std::collections::HashMap;

pub type Beans = HashMap<ObjectName, HashMap<String, AttributeValue>>;

pub const LATENCY_ATTRIBUTES: &[&str] = &[
    "Mean",
    "Max",
    "Min",
    "50thPercentile",
    "75thPercentile",
    "95thPercentile",
    "98thPercentile",
    "99thPercentile",
    "999thPercentile",
];

/// Nombre de métriques produites par un catalogue complet
pub const FULL_CATALOG_METRICS: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct HostCatalog {
    beans: Beans,
}

/// `scope=Read|Write` du timer de latence client
pub fn latency_bean(scope: &str) -> String {
    format!("{METRICS_DOMAIN}:type=ClientRequest,scope={scope},name=Latency")
}

pub fn stage_bean(stage: &str) -> String {
    format!("{REQUEST_DOMAIN}:type={stage}")
}

pub fn cache_bean(cache: &str, name: &str) -> String {
    format!("{METRICS_DOMAIN}:type=Cache,scope={cache},name={name}")
}

pub fn failure_detector_bean() -> String {
    format!("{NET_DOMAIN}:type=FailureDetector")
}

pub fn storage_service_bean() -> String {
    format!("{STORAGE_SERVICE_DOMAIN}:type=StorageService")
}

impl HostCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue complet, latences en millisecondes.
    ///
    /// Lectures: Mean=1, Max=2 ... 999th=9; écritures: 10..18.
    pub fn healthy() -> Self {
        let mut catalog = Self::new();

        for (offset, scope) in [(0.0, "Read"), (9.0, "Write")] {
            let bean = latency_bean(scope);
            for (i, attribute) in LATENCY_ATTRIBUTES.iter().enumerate() {
                catalog = catalog.set(&bean, attribute, AttributeValue::Double(offset + i as f64 + 1.0));
            }
            catalog = catalog.set(&bean, "LatencyUnit", LatencyUnit::Milliseconds.as_str().into());
        }

        for stage in ["ReadStage", "MutationStage"] {
            let bean = stage_bean(stage);
            catalog = catalog
                .set(&bean, "ActiveCount", AttributeValue::Int(2))
                .set(&bean, "CompletedTasks", AttributeValue::Long(1_000_000))
                .set(&bean, "PendingTasks", AttributeValue::Long(0));
        }

        catalog = catalog
            .set(&format!("{METRICS_DOMAIN}:type=Compaction,name=PendingTasks"), "Value", AttributeValue::Int(3))
            .set(
                &format!("{METRICS_DOMAIN}:type=ThreadPools,path=internal,scope=MemtablePostFlusher,name=PendingTasks"),
                "Value",
                AttributeValue::Long(0),
            )
            .set(&failure_detector_bean(), "DownEndpointCount", AttributeValue::Int(0))
            .set(&failure_detector_bean(), "UpEndpointCount", AttributeValue::Int(3));

        for cache in ["KeyCache", "RowCache"] {
            catalog = catalog
                .set(&cache_bean(cache, "HitRate"), "Value", AttributeValue::Double(0.9))
                .set(&cache_bean(cache, "Size"), "Value", AttributeValue::Long(4096))
                .set(&cache_bean(cache, "Entries"), "Value", AttributeValue::Int(128));
        }

        catalog
    }

    /// Catalogue d'un nœud seed: expose `LiveNodes`
    pub fn seed<S: Into<String>>(live_nodes: impl IntoIterator<Item = S>) -> Self {
        let nodes: Vec<String> = live_nodes.into_iter().map(Into::into).collect();
        Self::new().set(&storage_service_bean(), "LiveNodes", AttributeValue::TextList(nodes))
    }

    pub fn set(mut self, bean: &str, attribute: &str, value: AttributeValue) -> Self {
        self.beans
            .entry(parse(bean))
            .or_default()
            .insert(attribute.to_string(), value);
        self
    }

    pub fn null(self, bean: &str, attribute: &str) -> Self {
        self.set(bean, attribute, AttributeValue::Null)
    }

    pub fn remove(mut self, bean: &str, attribute: &str) -> Self {
        if let Some(attributes) = self.beans.get_mut(&parse(bean)) {
            attributes.remove(attribute);
        }
        self
    }

    /// Même unité sur les deux timers de latence
    pub fn latency_unit(self, unit: LatencyUnit) -> Self {
        self.set(&latency_bean("Read"), "LatencyUnit", unit.as_str().into())
            .set(&latency_bean("Write"), "LatencyUnit", unit.as_str().into())
    }

    pub fn beans(&self) -> &Beans {
        &self.beans
    }

    pub fn into_beans(self) -> Beans {
        self.beans
    }
}

fn parse(bean: &str) -> ObjectName {
    bean.parse()
        .unwrap_or_else(|e| panic!("invalid test MBean name {bean}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_catalog_contents() {
        let catalog = HostCatalog::healthy();
        let read: ObjectName = latency_bean("Read").parse().unwrap();
        assert_eq!(catalog.beans()[&read]["Mean"], AttributeValue::Double(1.0));
        assert_eq!(catalog.beans()[&read]["LatencyUnit"], AttributeValue::Text("MILLISECONDS".into()));

        let write: ObjectName = latency_bean("Write").parse().unwrap();
        assert_eq!(catalog.beans()[&write]["999thPercentile"], AttributeValue::Double(18.0));
    }

    #[test]
    fn test_holes() {
        let catalog = HostCatalog::healthy()
            .remove(&stage_bean("ReadStage"), "ActiveCount")
            .null(&cache_bean("KeyCache", "HitRate"), "Value");

        let stage: ObjectName = stage_bean("ReadStage").parse().unwrap();
        assert!(!catalog.beans()[&stage].contains_key("ActiveCount"));

        let hit_rate: ObjectName = cache_bean("KeyCache", "HitRate").parse().unwrap();
        assert_eq!(catalog.beans()[&hit_rate]["Value"], AttributeValue::Null);
    }

    #[test]
    fn test_seed_catalog() {
        let catalog = HostCatalog::seed(["h1", "h2"]);
        let storage: ObjectName = storage_service_bean().parse().unwrap();
        assert_eq!(
            catalog.beans()[&storage]["LiveNodes"],
            AttributeValue::TextList(vec!["h1".into(), "h2".into()])
        );
    }
}
