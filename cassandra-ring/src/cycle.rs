//! Poll cycle orchestration
//!
//! One cycle walks `ResolvingRing -> CollectingHosts -> Reporting -> Done`:
//! - Resolve the ring from the discovery endpoint
//! - Open one connection per host and run the catalog against it
//! - Classify host failures (unreachable vs. partially unreadable)
//! - Push everything accumulated to the sink
//!
//! All cycle state lives in a [`PollCycleState`] owned by the running cycle,
//! so overlapping invocations never share a buffer.

use crate::collector::{collect_with_policy, FailurePolicy};
use crate::config::AgentConfig;
use crate::connection::Connector;
use crate::discovery::RingDiscovery;
use crate::error::{ConnectionError, CycleError, DiscoveryError, QueryError};
use crate::metric::{global_downtime_name, global_name, host_downtime_name, Metric, ValueType};
use crate::reporter::{report, MetricSink, ReportSummary};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Per-cycle accumulator
#[derive(Debug, Default)]
pub struct PollCycleState {
    pub metrics: Vec<Metric>,
    /// Hosts that could not be reached this cycle
    pub down_count: usize,
    /// Ring size at discovery time
    pub total_hosts: usize,
    /// Reachable hosts whose catalog could not be read completely
    pub partial_hosts: usize,
}

impl PollCycleState {
    fn record_total_hosts(&mut self, total: usize) {
        self.total_hosts = total;
        self.metrics
            .push(Metric::new(global_name("totalHosts"), ValueType::Count, Some(total)));
    }

    /// The global downtime metric is re-emitted with the running count; the
    /// last emission of a cycle carries the final value.
    fn record_unreachable(&mut self, host: &str) {
        self.down_count += 1;
        self.metrics
            .push(Metric::new(host_downtime_name(host), ValueType::Value, Some(1i64)));
        self.metrics
            .push(Metric::new(global_downtime_name(), ValueType::Count, Some(self.down_count)));
    }

    fn absorb(&mut self, host: &str, outcome: HostOutcome) {
        match outcome {
            HostOutcome::Collected(metrics) => self.metrics.extend(metrics),
            HostOutcome::Unreachable(e) => {
                error!(host = %host, error = %e, "host unreachable");
                self.record_unreachable(host);
            }
            HostOutcome::Partial(e) => {
                warn!(host = %host, error = %e, "host metrics unreadable, skipping host");
                self.partial_hosts += 1;
            }
        }
    }
}

/// Result of a completed (non-fatal) cycle
#[derive(Debug)]
pub struct CycleOutcome {
    pub state: PollCycleState,
    pub report: ReportSummary,
}

#[derive(Debug, thiserror::Error)]
enum PartialFailure {
    #[error(transparent)]
    Query(QueryError),
    #[error("collection timed out after {0:?}")]
    Timeout(Duration),
}

enum HostOutcome {
    Collected(Vec<Metric>),
    Unreachable(ConnectionError),
    Partial(PartialFailure),
}

/// Cycle settings, read once from [`AgentConfig`]
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub name: String,
    pub discovery_host: String,
    pub jmx_port: u16,
    pub connect_timeout: Duration,
    pub collect_timeout: Duration,
    pub max_concurrent_hosts: usize,
    pub on_query_failure: FailurePolicy,
}

impl From<&AgentConfig> for CycleSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            name: config.name.clone(),
            discovery_host: config.discovery_host.clone(),
            jmx_port: config.jmx_port,
            connect_timeout: config.connect_timeout(),
            collect_timeout: config.collect_timeout(),
            max_concurrent_hosts: config.max_concurrent_hosts.max(1),
            on_query_failure: config.on_query_failure,
        }
    }
}

/// The ring poller: discovery, connections and sink wired together
pub struct CassandraRing {
    settings: CycleSettings,
    discovery: Arc<dyn RingDiscovery>,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn MetricSink>,
}

impl CassandraRing {
    pub fn new(
        settings: CycleSettings,
        discovery: Arc<dyn RingDiscovery>,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            settings,
            discovery,
            connector,
            sink,
        }
    }

    pub fn component_label(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run one poll cycle.
    ///
    /// Only a discovery failure that is not connection-class is returned as
    /// an error; in that case nothing is reported.
    pub async fn poll_cycle(&self) -> Result<CycleOutcome, CycleError> {
        debug!("starting poll cycle");
        let mut state = PollCycleState::default();
        let endpoint = self.settings.discovery_host.as_str();

        debug!(endpoint = %endpoint, "getting ring hosts from discovery host");
        match self.resolve_ring(endpoint).await {
            Ok(hosts) => {
                debug!(hosts = ?hosts, "getting metrics for hosts");
                state.record_total_hosts(hosts.len());
                self.collect_hosts(&hosts, &mut state).await;
            }
            Err(DiscoveryError::Connection(e)) => {
                error!(endpoint = %endpoint, error = %e, "ring discovery unreachable");
                state.record_unreachable(endpoint);
            }
            Err(DiscoveryError::Other(source)) => {
                return Err(CycleError::Discovery {
                    endpoint: endpoint.to_string(),
                    source,
                });
            }
        }

        let report = report(self.sink.as_ref(), &state.metrics);
        Ok(CycleOutcome { state, report })
    }

    /// Poll once per `period` until `shutdown` resolves. A cycle still running
    /// at shutdown is dropped.
    pub async fn run_until<F: Future<Output = ()>>(&self, period: Duration, shutdown: F) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }

            tokio::select! {
                result = self.poll_cycle() => match result {
                    Ok(outcome) => debug!(
                        hosts = outcome.state.total_hosts,
                        down = outcome.state.down_count,
                        pushed = outcome.report.pushed,
                        dropped = outcome.report.dropped,
                        "poll cycle done"
                    ),
                    Err(e) => error!("Poll cycle for '{}' failed: {}", self.component_label(), e),
                },
                _ = &mut shutdown => {
                    info!("shutdown requested during a poll cycle");
                    break;
                }
            }
        }
    }

    /// Discovery shares the per-host deadline budget; running out of it counts
    /// as an unreachable endpoint.
    async fn resolve_ring(&self, endpoint: &str) -> Result<Vec<String>, DiscoveryError> {
        let deadline = self.settings.connect_timeout + self.settings.collect_timeout;
        match timeout(deadline, self.discovery.resolve_hosts(endpoint, self.settings.jmx_port)).await {
            Ok(resolved) => resolved,
            Err(_) => Err(ConnectionError::new(endpoint, format!("discovery timed out after {deadline:?}")).into()),
        }
    }

    /// Hosts run concurrently, but outcomes are folded in discovery order by
    /// this task alone.
    async fn collect_hosts(&self, hosts: &[String], state: &mut PollCycleState) {
        let mut outcomes = stream::iter(hosts)
            .map(|host| async move { (host, self.poll_host(host).await) })
            .buffered(self.settings.max_concurrent_hosts);

        while let Some((host, outcome)) = outcomes.next().await {
            state.absorb(host, outcome);
        }
    }

    async fn poll_host(&self, host: &str) -> HostOutcome {
        debug!(host = %host, "getting metrics for host");
        let settings = &self.settings;

        let connection = match timeout(settings.connect_timeout, self.connector.connect(host, settings.jmx_port)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return HostOutcome::Unreachable(e),
            Err(_) => {
                return HostOutcome::Unreachable(ConnectionError::new(
                    host,
                    format!("connect timed out after {:?}", settings.connect_timeout),
                ))
            }
        };

        let collected = timeout(
            settings.collect_timeout,
            collect_with_policy(connection.as_ref(), host, settings.on_query_failure),
        )
        .await;
        connection.close().await;

        match collected {
            Ok(Ok(metrics)) => HostOutcome::Collected(metrics),
            Ok(Err(QueryError::Connection(e))) => HostOutcome::Unreachable(e),
            Ok(Err(e)) => HostOutcome::Partial(PartialFailure::Query(e)),
            Err(_) => HostOutcome::Partial(PartialFailure::Timeout(settings.collect_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{AttributeValue, ManagementConnection};
    use crate::metric::MetricValue;
    use crate::object_name::ObjectName;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRing(Result<Vec<String>, &'static str>);

    #[async_trait]
    impl RingDiscovery for FixedRing {
        async fn resolve_hosts(&self, endpoint: &str, _port: u16) -> Result<Vec<String>, DiscoveryError> {
            match &self.0 {
                Ok(hosts) => Ok(hosts.clone()),
                Err("unreachable") => Err(ConnectionError::new(endpoint, "refused").into()),
                Err("hang") => std::future::pending().await,
                Err(other) => Err(DiscoveryError::Other(anyhow::anyhow!("{other}"))),
            }
        }
    }

    /// Every MBean exists and every attribute reads as 1 (unit MILLISECONDS)
    struct OnesConnection;

    #[async_trait]
    impl ManagementConnection for OnesConnection {
        fn host(&self) -> &str {
            "any"
        }

        async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError> {
            Ok(vec![selector.clone()])
        }

        async fn get_attribute(&self, _object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError> {
            Ok(match attribute {
                "LatencyUnit" => "MILLISECONDS".into(),
                _ => AttributeValue::Int(1),
            })
        }
    }

    /// Hosts named `down*` refuse connections
    struct PrefixConnector;

    #[async_trait]
    impl Connector for PrefixConnector {
        async fn connect(&self, host: &str, _port: u16) -> Result<Box<dyn ManagementConnection>, ConnectionError> {
            if host.starts_with("down") {
                Err(ConnectionError::new(host, "refused"))
            } else {
                Ok(Box::new(OnesConnection))
            }
        }
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<String>>);

    impl MetricSink for VecSink {
        fn report_metric(&self, name: &str, _unit: ValueType, _value: MetricValue) {
            self.0.lock().unwrap().push(name.to_string());
        }
    }

    fn settings() -> CycleSettings {
        CycleSettings {
            name: "test ring".into(),
            discovery_host: "seed".into(),
            jmx_port: 8778,
            connect_timeout: Duration::from_secs(1),
            collect_timeout: Duration::from_secs(1),
            max_concurrent_hosts: 2,
            on_query_failure: FailurePolicy::AbortHost,
        }
    }

    fn ring(discovery: FixedRing, sink: Arc<VecSink>) -> CassandraRing {
        CassandraRing::new(settings(), Arc::new(discovery), Arc::new(PrefixConnector), sink)
    }

    #[tokio::test]
    async fn test_down_hosts_counted() {
        let sink = Arc::new(VecSink::default());
        let hosts = vec!["up1".to_string(), "down1".to_string(), "up2".to_string(), "down2".to_string()];
        let outcome = ring(FixedRing(Ok(hosts)), sink.clone()).poll_cycle().await.unwrap();

        assert_eq!(outcome.state.total_hosts, 4);
        assert_eq!(outcome.state.down_count, 2);

        let downtime: Vec<_> = outcome
            .state
            .metrics
            .iter()
            .filter(|m| m.name == "Cassandra/downtime/global")
            .map(|m| m.value)
            .collect();
        assert_eq!(downtime, vec![Some(MetricValue::Int(1)), Some(MetricValue::Int(2))]);
        assert_eq!(outcome.report.pushed, sink.0.lock().unwrap().len());
    }

    #[tokio::test]
    async fn test_discovery_unreachable_reports_two_metrics() {
        let sink = Arc::new(VecSink::default());
        let outcome = ring(FixedRing(Err("unreachable")), sink.clone()).poll_cycle().await.unwrap();

        assert_eq!(
            *sink.0.lock().unwrap(),
            vec!["Cassandra/downtime/hosts/seed".to_string(), "Cassandra/downtime/global".to_string()]
        );
        assert_eq!(outcome.state.total_hosts, 0);
    }

    #[tokio::test]
    async fn test_hung_discovery_counts_as_unreachable() {
        let sink = Arc::new(VecSink::default());
        let mut settings = settings();
        settings.connect_timeout = Duration::from_millis(50);
        settings.collect_timeout = Duration::from_millis(50);
        let ring = CassandraRing::new(settings, Arc::new(FixedRing(Err("hang"))), Arc::new(PrefixConnector), sink.clone());

        let outcome = ring.poll_cycle().await.unwrap();
        assert_eq!(outcome.state.down_count, 1);
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec!["Cassandra/downtime/hosts/seed".to_string(), "Cassandra/downtime/global".to_string()]
        );
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_running_cycle() {
        let sink = Arc::new(VecSink::default());
        let mut settings = settings();
        settings.connect_timeout = Duration::from_secs(3600);
        let ring = CassandraRing::new(settings, Arc::new(FixedRing(Err("hang"))), Arc::new(PrefixConnector), sink.clone());

        let stopped = timeout(
            Duration::from_secs(2),
            ring.run_until(Duration::from_secs(60), tokio::time::sleep(Duration::from_millis(50))),
        )
        .await;
        assert!(stopped.is_ok());
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_until_polls_on_each_tick() {
        let sink = Arc::new(VecSink::default());
        let ring = ring(FixedRing(Ok(vec![])), sink.clone());

        ring.run_until(Duration::from_millis(20), tokio::time::sleep(Duration::from_millis(70))).await;
        let cycles = sink.0.lock().unwrap().iter().filter(|n| n.ends_with("totalHosts")).count();
        assert!(cycles >= 2, "only {cycles} cycles ran");
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal() {
        let sink = Arc::new(VecSink::default());
        let result = ring(FixedRing(Err("bad reply")), sink.clone()).poll_cycle().await;

        assert!(matches!(result, Err(CycleError::Discovery { .. })));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_ring() {
        let sink = Arc::new(VecSink::default());
        let outcome = ring(FixedRing(Ok(vec![])), sink.clone()).poll_cycle().await.unwrap();

        assert_eq!(*sink.0.lock().unwrap(), vec!["Cassandra/global/totalHosts".to_string()]);
        assert_eq!(outcome.state.down_count, 0);
    }

    #[test]
    fn test_settings_from_config() {
        let config: AgentConfig = toml::from_str("name = \"ring\"\ndiscovery_host = \"seed\"").unwrap();
        let settings = CycleSettings::from(&config);
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_concurrent_hosts, 4);
    }
}
