//! Per-host metric collection
//!
//! Runs the fixed catalog of MBean reads against one open connection:
//! - Client request latency (reads and writes), normalized to milliseconds
//! - Request stage throughput (`ReadStage`, `MutationStage`)
//! - Compaction and memtable flush backlog (host only)
//! - Failure detector endpoint counts (global only)
//! - Key and row cache statistics
//!
//! Every mirrored measurement is emitted twice: under
//! `Cassandra/hosts/<host>/...` and under `Cassandra/global/...` with the same
//! value. Nothing is summed across hosts.

use crate::connection::ManagementConnection;
use crate::error::QueryError;
use crate::metric::{global_name, host_name, Metric, MetricValue, ValueType};
use crate::object_name::ObjectName;
use crate::query::{query_attribute, query_latency_unit, query_scoped, FromAttribute};
use crate::units::to_millis;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

pub const METRICS_DOMAIN: &str = "org.apache.cassandra.metrics";
pub const REQUEST_DOMAIN: &str = "org.apache.cassandra.request";
pub const NET_DOMAIN: &str = "org.apache.cassandra.net";

/// Timer attribute -> metric label prefix
const LATENCY_ATTRIBUTES: &[(&str, &str)] = &[
    ("Mean", "Mean"),
    ("Max", "Max"),
    ("Min", "Min"),
    ("50thPercentile", "50th"),
    ("75thPercentile", "75th"),
    ("95thPercentile", "95th"),
    ("98thPercentile", "98th"),
    ("99thPercentile", "99th"),
    ("999thPercentile", "999th"),
];

/// (scope, label suffix)
const LATENCY_GROUPS: &[(&str, &str)] = &[("Read", "Reads"), ("Write", "Writes")];

const STAGES: &[&str] = &["ReadStage", "MutationStage"];

const CACHES: &[&str] = &["KeyCache", "RowCache"];

/// What to do when one catalog read fails for a reason other than the
/// connection itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop this host's catalog at the first failed read
    #[default]
    AbortHost,
    /// Drop the failed entry and keep going
    SkipMetric,
}

/// Namespaces a measurement is emitted under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Mirrored,
    HostOnly,
    GlobalOnly,
}

struct Entry {
    suffix: String,
    value_type: ValueType,
    value: Option<MetricValue>,
}

/// Catalog MBean addressed by the `type`/`scope`/`name` convenience form
#[derive(Debug, Clone, Copy)]
struct Scoped<'s> {
    domain: &'static str,
    type_: &'s str,
    scope: Option<&'s str>,
    name: Option<&'s str>,
}

impl Scoped<'_> {
    fn selector(&self) -> ObjectName {
        ObjectName::scoped(self.domain, self.type_, self.scope, self.name)
    }
}

impl fmt::Display for Scoped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.selector(), f)
    }
}

impl Entry {
    fn new(suffix: impl Into<String>, value_type: ValueType, value: Option<MetricValue>) -> Self {
        Self {
            suffix: suffix.into(),
            value_type,
            value,
        }
    }
}

/// Collect the full catalog for `host`, aborting at the first failed read
pub async fn collect(connection: &dyn ManagementConnection, host: &str) -> Result<Vec<Metric>, QueryError> {
    collect_with_policy(connection, host, FailurePolicy::AbortHost).await
}

pub async fn collect_with_policy(
    connection: &dyn ManagementConnection,
    host: &str,
    policy: FailurePolicy,
) -> Result<Vec<Metric>, QueryError> {
    let mut collector = HostCollector {
        connection,
        host,
        policy,
        metrics: Vec::new(),
        skipped: 0,
    };

    for (scope, label) in LATENCY_GROUPS {
        collector.latency(scope, label).await?;
    }
    for stage in STAGES {
        collector.stage(stage).await?;
    }
    collector.system().await?;
    collector.failure_detector().await?;
    for cache in CACHES {
        collector.cache(cache).await?;
    }

    debug!(
        host = %host,
        metrics = collector.metrics.len(),
        skipped = collector.skipped,
        "host catalog collected"
    );
    Ok(collector.metrics)
}

struct HostCollector<'a> {
    connection: &'a dyn ManagementConnection,
    host: &'a str,
    policy: FailurePolicy,
    metrics: Vec<Metric>,
    skipped: usize,
}

impl<'a> HostCollector<'a> {
    /// Apply the failure policy to one read. `Ok(None)` means the entry was
    /// skipped.
    fn settle<T>(
        &mut self,
        selector: &dyn fmt::Display,
        attribute: &str,
        result: Result<T, QueryError>,
    ) -> Result<Option<T>, QueryError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_connection() || self.policy == FailurePolicy::AbortHost => Err(e),
            Err(e) => {
                warn!(host = %self.host, object = %selector, attribute, error = %e, "skipping unreadable attribute");
                self.skipped += 1;
                Ok(None)
            }
        }
    }

    async fn read<T: FromAttribute>(&mut self, selector: &ObjectName, attribute: &str) -> Result<Option<T>, QueryError> {
        let connection = self.connection;
        let result = query_attribute::<T>(connection, selector, attribute).await;
        self.settle(selector, attribute, result)
    }

    async fn read_scoped<T: FromAttribute>(&mut self, entry: Scoped<'_>, attribute: &str) -> Result<Option<T>, QueryError> {
        let connection = self.connection;
        let result =
            query_scoped::<T>(connection, entry.domain, entry.type_, entry.scope, entry.name, attribute).await;
        self.settle(&entry, attribute, result)
    }

    async fn value_scoped<T>(&mut self, entry: Scoped<'_>, attribute: &str) -> Result<Option<Option<MetricValue>>, QueryError>
    where
        T: FromAttribute + Into<MetricValue>,
    {
        let read = self.read_scoped::<Option<T>>(entry, attribute).await?;
        Ok(read.map(|v| v.map(Into::into)))
    }

    /// Nullable numeric read, converted to a metric value
    async fn value<T>(&mut self, selector: &ObjectName, attribute: &str) -> Result<Option<Option<MetricValue>>, QueryError>
    where
        T: FromAttribute + Into<MetricValue>,
    {
        let read = self.read::<Option<T>>(selector, attribute).await?;
        Ok(read.map(|v| v.map(Into::into)))
    }

    fn emit(&mut self, scope: Scope, entries: Vec<Entry>) {
        if scope != Scope::GlobalOnly {
            for entry in &entries {
                self.metrics
                    .push(Metric::new(host_name(self.host, &entry.suffix), entry.value_type, entry.value));
            }
        }
        if scope != Scope::HostOnly {
            for entry in &entries {
                self.metrics
                    .push(Metric::new(global_name(&entry.suffix), entry.value_type, entry.value));
            }
        }
    }

    async fn latency(&mut self, scope: &str, label: &str) -> Result<(), QueryError> {
        let timer = Scoped {
            domain: METRICS_DOMAIN,
            type_: "ClientRequest",
            scope: Some(scope),
            name: Some("Latency"),
        };

        let mut samples = Vec::with_capacity(LATENCY_ATTRIBUTES.len());
        for (attribute, prefix) in LATENCY_ATTRIBUTES {
            if let Some(sample) = self.read_scoped::<Option<f64>>(timer, attribute).await? {
                samples.push((*prefix, sample));
            }
        }

        let selector = timer.selector();
        let connection = self.connection;
        let unit = query_latency_unit(connection, &selector, "LatencyUnit").await;
        let Some(unit) = self.settle(&selector, "LatencyUnit", unit)? else {
            // values without a unit cannot be normalized
            return Ok(());
        };

        let entries = samples
            .into_iter()
            .map(|(prefix, sample)| {
                let millis = to_millis(sample, unit).map(MetricValue::Float);
                Entry::new(format!("Latency/{prefix}{label}"), ValueType::Millis, millis)
            })
            .collect();
        self.emit(Scope::Mirrored, entries);
        Ok(())
    }

    async fn stage(&mut self, stage: &str) -> Result<(), QueryError> {
        let selector = Scoped {
            domain: REQUEST_DOMAIN,
            type_: stage,
            scope: None,
            name: None,
        };
        let mut entries = Vec::new();

        if let Some(active) = self.value_scoped::<i32>(selector, "ActiveCount").await? {
            entries.push(Entry::new(format!("Request/{stage}/ActiveCount"), ValueType::Count, active));
        }
        if let Some(completed) = self.value_scoped::<i64>(selector, "CompletedTasks").await? {
            entries.push(Entry::new(format!("Request/{stage}/CompletedTasks"), ValueType::Count, completed));
        }
        if let Some(pending) = self.value_scoped::<i64>(selector, "PendingTasks").await? {
            entries.push(Entry::new(format!("Request/{stage}/PendingTasks"), ValueType::Count, pending));
        }

        self.emit(Scope::Mirrored, entries);
        Ok(())
    }

    async fn system(&mut self) -> Result<(), QueryError> {
        let compaction = ObjectName::new(METRICS_DOMAIN)
            .key("type", "Compaction")
            .key("name", "PendingTasks");
        let flusher = ObjectName::new(METRICS_DOMAIN)
            .key("type", "ThreadPools")
            .key("path", "internal")
            .key("scope", "MemtablePostFlusher")
            .key("name", "PendingTasks");

        let mut entries = Vec::new();
        if let Some(pending) = self.value::<i32>(&compaction, "Value").await? {
            entries.push(Entry::new("Compaction/PendingTasks", ValueType::Count, pending));
        }
        if let Some(pending) = self.value::<i64>(&flusher, "Value").await? {
            entries.push(Entry::new("MemtableFlush/PendingTasks", ValueType::Count, pending));
        }

        self.emit(Scope::HostOnly, entries);
        Ok(())
    }

    async fn failure_detector(&mut self) -> Result<(), QueryError> {
        let detector = ObjectName::new(NET_DOMAIN).key("type", "FailureDetector");

        let mut entries = Vec::new();
        if let Some(down) = self.value::<i32>(&detector, "DownEndpointCount").await? {
            entries.push(Entry::new("DownEndpointCount", ValueType::Count, down));
        }
        if let Some(up) = self.value::<i32>(&detector, "UpEndpointCount").await? {
            entries.push(Entry::new("UpEndpointCount", ValueType::Count, up));
        }

        self.emit(Scope::GlobalOnly, entries);
        Ok(())
    }

    async fn cache(&mut self, cache: &str) -> Result<(), QueryError> {
        let gauge = |name: &str| {
            ObjectName::new(METRICS_DOMAIN)
                .key("type", "Cache")
                .key("scope", cache)
                .key("name", name)
        };

        let mut entries = Vec::new();
        if let Some(hit_rate) = self.value::<f64>(&gauge("HitRate"), "Value").await? {
            entries.push(Entry::new(format!("Cache/{cache}/HitRate"), ValueType::Rate, hit_rate));
        }
        if let Some(size) = self.value::<i64>(&gauge("Size"), "Value").await? {
            entries.push(Entry::new(format!("Cache/{cache}/Size"), ValueType::Bytes, size));
        }
        if let Some(count) = self.value::<i32>(&gauge("Entries"), "Value").await? {
            entries.push(Entry::new(format!("Cache/{cache}/Entries"), ValueType::Count, count));
        }

        self.emit(Scope::Mirrored, entries);
        Ok(())
    }
}
