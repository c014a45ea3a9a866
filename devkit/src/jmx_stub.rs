/*!
Stubs JMX pour développement sans nœud Cassandra

Remplace les ports réseau de l'agent par des doubles en mémoire:
- `FakeConnector` / `FakeConnection`: hôtes simulés servant un `HostCatalog`
- `StaticRing`: découverte du ring à réponse fixe
- `RecordingSink`: enregistre toutes les métriques poussées

Chaque hôte a un `HostBehavior` qui décide s'il répond, refuse, bloque ou
coupe la connexion en cours de collecte.
*/

use crate::catalog::{Beans, HostCatalog};
use anyhow::anyhow;
use async_trait::async_trait;
use cassandra_ring::{
    AttributeValue, ConnectionError, Connector, DiscoveryError, ManagementConnection, MetricSink, MetricValue,
    ObjectName, QueryError, RingDiscovery, ValueType,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Comportement d'un hôte simulé
#[derive(Debug, Clone)]
pub enum HostBehavior {
    /// Répond avec ce catalogue
    Serve(HostCatalog),
    /// Connexion refusée
    Refuse,
    /// `connect` ne rend jamais la main
    HangOnConnect,
    /// Connexion ouverte, mais aucune lecture ne termine
    HangOnRead,
    /// Sert le catalogue puis coupe la connexion après N lectures d'attribut
    DropAfter(HostCatalog, usize),
}

/// Connecteur simulé, un comportement par hôte. Un hôte inconnu refuse.
#[derive(Default)]
pub struct FakeConnector {
    hosts: Mutex<HashMap<String, HostBehavior>>,
    attempts: Mutex<Vec<(String, u16)>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host: &str, behavior: HostBehavior) -> Self {
        self.set_host(host, behavior);
        self
    }

    pub fn set_host(&self, host: &str, behavior: HostBehavior) {
        self.hosts.lock().insert(host.to_string(), behavior);
    }

    /// Hôtes et ports demandés, dans l'ordre des appels
    pub fn attempts(&self) -> Vec<(String, u16)> {
        self.attempts.lock().clone()
    }

    pub fn opened_connections(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed_connections(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ManagementConnection>, ConnectionError> {
        self.attempts.lock().push((host.to_string(), port));
        let behavior = self.hosts.lock().get(host).cloned();

        let (beans, mode) = match behavior {
            Some(HostBehavior::Serve(catalog)) => (catalog.into_beans(), ReadMode::Normal),
            Some(HostBehavior::DropAfter(catalog, reads)) => (catalog.into_beans(), ReadMode::DropAfter(reads)),
            Some(HostBehavior::HangOnRead) => (Beans::new(), ReadMode::Hang),
            Some(HostBehavior::HangOnConnect) => {
                log::info!("⏳ [STUB] {} never answers connect", host);
                std::future::pending().await
            }
            Some(HostBehavior::Refuse) | None => {
                log::info!("🚫 [STUB] {} refused connection", host);
                return Err(ConnectionError::new(host, "connection refused"));
            }
        };

        self.opened.fetch_add(1, Ordering::SeqCst);
        log::info!("🔌 [STUB] Connected to {}:{}", host, port);
        Ok(Box::new(FakeConnection {
            host: host.to_string(),
            beans,
            mode,
            reads: AtomicUsize::new(0),
            closed: self.closed.clone(),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum ReadMode {
    Normal,
    Hang,
    DropAfter(usize),
}

pub struct FakeConnection {
    host: String,
    beans: Beans,
    mode: ReadMode,
    reads: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl FakeConnection {
    /// Connexion isolée sur un catalogue, hors connecteur
    pub fn serving(host: &str, catalog: HostCatalog) -> Self {
        Self {
            host: host.to_string(),
            beans: catalog.into_beans(),
            mode: ReadMode::Normal,
            reads: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    async fn gate(&self) -> Result<(), QueryError> {
        match self.mode {
            ReadMode::Normal => Ok(()),
            ReadMode::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            ReadMode::DropAfter(limit) => {
                if self.reads.load(Ordering::SeqCst) >= limit {
                    Err(ConnectionError::new(&self.host, "connection reset by peer").into())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[async_trait]
impl ManagementConnection for FakeConnection {
    fn host(&self) -> &str {
        &self.host
    }

    async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError> {
        self.gate().await?;
        let mut names: Vec<ObjectName> = self.beans.keys().filter(|name| selector.matches(name)).cloned().collect();
        names.sort_by_key(|name| name.to_string());
        Ok(names)
    }

    async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError> {
        self.gate().await?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let attributes = self
            .beans
            .get(object)
            .ok_or_else(|| QueryError::NotFound(object.to_string()))?;
        attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| QueryError::MissingAttribute {
                object: object.to_string(),
                attribute: attribute.to_string(),
            })
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        log::info!("🔒 [STUB] Closed connection to {}", self.host);
    }
}

/// Réponse fixe de la découverte du ring
#[derive(Debug, Clone)]
pub enum StaticRing {
    Hosts(Vec<String>),
    /// Échec de classe connexion sur l'endpoint
    Unreachable,
    /// Toute autre erreur de découverte
    Broken(String),
}

impl StaticRing {
    pub fn hosts<S: Into<String>>(hosts: impl IntoIterator<Item = S>) -> Self {
        Self::Hosts(hosts.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl RingDiscovery for StaticRing {
    async fn resolve_hosts(&self, endpoint: &str, _port: u16) -> Result<Vec<String>, DiscoveryError> {
        match self {
            Self::Hosts(hosts) => Ok(hosts.clone()),
            Self::Unreachable => Err(ConnectionError::new(endpoint, "connection refused").into()),
            Self::Broken(reason) => Err(DiscoveryError::Other(anyhow!("{}", reason))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportedMetric {
    pub name: String,
    pub unit: ValueType,
    pub value: MetricValue,
}

/// Sink qui garde toutes les métriques reçues, dans l'ordre
#[derive(Debug, Default)]
pub struct RecordingSink {
    reported: Mutex<Vec<ReportedMetric>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> Vec<ReportedMetric> {
        self.reported.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.reported.lock().iter().map(|m| m.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.reported.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.lock().is_empty()
    }

    /// Dernière valeur reçue pour ce nom
    pub fn last_value(&self, name: &str) -> Option<MetricValue> {
        self.reported.lock().iter().rev().find(|m| m.name == name).map(|m| m.value)
    }

    pub fn clear(&self) {
        self.reported.lock().clear();
    }
}

impl MetricSink for RecordingSink {
    fn report_metric(&self, name: &str, unit: ValueType, value: MetricValue) {
        self.reported.lock().push(ReportedMetric {
            name: name.to_string(),
            unit,
            value,
        });
    }
}
