//! Ring membership discovery
//!
//! The host list is resolved fresh on every cycle; nothing here caches it.

use crate::connection::Connector;
use crate::error::{DiscoveryError, QueryError};
use crate::object_name::ObjectName;
use crate::query::query_attribute;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub const STORAGE_SERVICE_DOMAIN: &str = "org.apache.cassandra.db";

/// Resolves a discovery endpoint to the current live ring hosts
#[async_trait]
pub trait RingDiscovery: Send + Sync {
    async fn resolve_hosts(&self, endpoint: &str, port: u16) -> Result<Vec<String>, DiscoveryError>;
}

/// Reads `LiveNodes` from the StorageService MBean of the discovery host
pub struct ConnectorRingDiscovery {
    connector: Arc<dyn Connector>,
}

impl ConnectorRingDiscovery {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl RingDiscovery for ConnectorRingDiscovery {
    async fn resolve_hosts(&self, endpoint: &str, port: u16) -> Result<Vec<String>, DiscoveryError> {
        let connection = self.connector.connect(endpoint, port).await?;
        let storage = ObjectName::new(STORAGE_SERVICE_DOMAIN).key("type", "StorageService");

        let result = query_attribute::<Vec<String>>(connection.as_ref(), &storage, "LiveNodes").await;
        connection.close().await;

        let hosts = result.map_err(|e| match e {
            QueryError::Connection(e) => DiscoveryError::Connection(e),
            other => DiscoveryError::Other(other.into()),
        })?;

        debug!(endpoint = %endpoint, hosts = hosts.len(), "ring resolved");
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{AttributeValue, ManagementConnection};
    use crate::error::ConnectionError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StorageConnection {
        live_nodes: Option<AttributeValue>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ManagementConnection for StorageConnection {
        fn host(&self) -> &str {
            "seed"
        }

        async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError> {
            let storage: ObjectName = "org.apache.cassandra.db:type=StorageService".parse().unwrap();
            Ok(if selector.matches(&storage) { vec![storage] } else { vec![] })
        }

        async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError> {
            self.live_nodes.clone().ok_or_else(|| QueryError::MissingAttribute {
                object: object.to_string(),
                attribute: attribute.to_string(),
            })
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct SeedConnector {
        reachable: bool,
        live_nodes: Option<AttributeValue>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for SeedConnector {
        async fn connect(&self, host: &str, _port: u16) -> Result<Box<dyn ManagementConnection>, ConnectionError> {
            if !self.reachable {
                return Err(ConnectionError::new(host, "connection refused"));
            }
            Ok(Box::new(StorageConnection {
                live_nodes: self.live_nodes.clone(),
                closed: self.closed.clone(),
            }))
        }
    }

    fn discovery(reachable: bool, live_nodes: Option<AttributeValue>) -> (ConnectorRingDiscovery, Arc<AtomicUsize>) {
        let closed = Arc::new(AtomicUsize::new(0));
        let connector = SeedConnector { reachable, live_nodes, closed: closed.clone() };
        (ConnectorRingDiscovery::new(Arc::new(connector)), closed)
    }

    #[tokio::test]
    async fn test_live_nodes_in_reported_order() {
        let nodes = vec!["10.0.0.3".to_string(), "10.0.0.1".to_string()];
        let (discovery, closed) = discovery(true, Some(nodes.clone().into()));

        let hosts = discovery.resolve_hosts("seed", 8778).await.unwrap();
        assert_eq!(hosts, nodes);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_seed_is_connection_class() {
        let (discovery, _) = discovery(false, None);
        let err = discovery.resolve_hosts("seed", 8778).await.unwrap_err();
        match err {
            DiscoveryError::Connection(e) => assert_eq!(e.host, "seed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_live_nodes_is_other() {
        let (discovery, closed) = discovery(true, None);
        let err = discovery.resolve_hosts("seed", 8778).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Other(_)));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
