//! Metric value model shared by the collector, the cycle and the reporter

use serde::Serialize;
use std::fmt;

/// Root of every metric name emitted by the agent
pub const ROOT: &str = "Cassandra";

/// Unit label attached to a metric when it is handed to the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Count,
    Millis,
    Rate,
    Bytes,
    Value,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Millis => "millis",
            Self::Rate => "rate",
            Self::Bytes => "bytes",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric payload of a metric, keeping the integer/float distinction of the
/// remote attribute
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Float(v) if v.is_nan())
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_nan() => f.write_str("NaN"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// One measurement produced during a poll cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value_type: ValueType,
    pub value: Option<MetricValue>,
}

impl Metric {
    pub fn new<V: Into<MetricValue>>(name: impl Into<String>, value_type: ValueType, value: Option<V>) -> Self {
        Self {
            name: name.into(),
            value_type,
            value: value.map(Into::into),
        }
    }

    /// A value that is present and not NaN can be forwarded to the sink
    pub fn is_reportable(&self) -> bool {
        self.value.is_some_and(|v| !v.is_nan())
    }
}

/// `Cassandra/hosts/<host>/<suffix>`
pub fn host_name(host: &str, suffix: &str) -> String {
    format!("{ROOT}/hosts/{host}/{suffix}")
}

/// `Cassandra/global/<suffix>`
pub fn global_name(suffix: &str) -> String {
    format!("{ROOT}/global/{suffix}")
}

/// `Cassandra/downtime/hosts/<host>`
pub fn host_downtime_name(host: &str) -> String {
    format!("{ROOT}/downtime/hosts/{host}")
}

/// `Cassandra/downtime/global`
pub fn global_downtime_name() -> String {
    format!("{ROOT}/downtime/global")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(host_name("10.0.0.1", "Latency/MeanReads"), "Cassandra/hosts/10.0.0.1/Latency/MeanReads");
        assert_eq!(global_name("totalHosts"), "Cassandra/global/totalHosts");
        assert_eq!(host_downtime_name("h2"), "Cassandra/downtime/hosts/h2");
        assert_eq!(global_downtime_name(), "Cassandra/downtime/global");
    }

    #[test]
    fn test_reportable() {
        assert!(Metric::new("a", ValueType::Count, Some(3i64)).is_reportable());
        assert!(Metric::new("a", ValueType::Millis, Some(0.0)).is_reportable());
        assert!(!Metric::new("a", ValueType::Millis, Some(f64::NAN)).is_reportable());
        assert!(!Metric::new::<f64>("a", ValueType::Millis, None).is_reportable());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MetricValue::Float(f64::NAN).to_string(), "NaN");
        assert_eq!(MetricValue::Int(7).to_string(), "7");
        assert_eq!(MetricValue::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_value_serializes_untagged() {
        let metric = Metric::new("Cassandra/global/totalHosts", ValueType::Count, Some(3usize));
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["value"], 3);
        assert_eq!(json["value_type"], "count");
    }
}
