/*!
# Cassandra Ring DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le test de l'agent Cassandra Ring avec:
- Stubs JMX pour tests sans nœud Cassandra
- Catalogues MBean prêts à l'emploi
- Sink d'enregistrement des métriques
- Harness de cycle complet
*/

pub mod catalog;
pub mod jmx_stub;
pub mod test_utils;

pub use anyhow;

pub use catalog::HostCatalog;
pub use jmx_stub::{FakeConnection, FakeConnector, HostBehavior, RecordingSink, StaticRing};
pub use test_utils::TestHarness;
