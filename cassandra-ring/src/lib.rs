//! Cassandra Ring - poll-cycle metrics agent for a Cassandra cluster
//!
//! Every cycle the agent:
//! - Resolves the live ring from a discovery host
//! - Connects to each node's management interface (JMX via Jolokia)
//! - Reads a fixed catalog of latency, throughput, cache and health MBeans
//! - Mirrors each host measurement into a global namespace
//! - Pushes the result to a sink (log or MQTT)
//!
//! A node that cannot be reached is reported as downtime and never stops
//! the other nodes from being collected.

pub mod collector;
pub mod config;
pub mod connection;
pub mod cycle;
pub mod discovery;
pub mod error;
pub mod jolokia;
pub mod metric;
pub mod mqtt_sink;
pub mod object_name;
pub mod query;
pub mod reporter;
pub mod units;

pub use collector::{collect, collect_with_policy, FailurePolicy};
pub use config::AgentConfig;
pub use connection::{AttributeValue, Connector, ManagementConnection};
pub use cycle::{CassandraRing, CycleOutcome, CycleSettings, PollCycleState};
pub use discovery::{ConnectorRingDiscovery, RingDiscovery};
pub use error::{ConfigError, ConnectionError, CycleError, DiscoveryError, QueryError};
pub use metric::{Metric, MetricValue, ValueType};
pub use object_name::ObjectName;
pub use reporter::{report, LogSink, MetricSink, ReportSummary};
pub use units::{to_millis, LatencyUnit};
