//! Hands accumulated metrics to the sink, one call per metric

use crate::metric::{Metric, MetricValue, ValueType};
use tracing::{debug, info};

/// Destination for accepted metrics. Fire-and-forget: delivery problems are
/// the sink's own business.
pub trait MetricSink: Send + Sync {
    fn report_metric(&self, name: &str, unit: ValueType, value: MetricValue);
}

/// Outcome of one push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub pushed: usize,
    pub dropped: usize,
}

/// Forward every present, non-NaN metric in accumulation order
pub fn report(sink: &dyn MetricSink, metrics: &[Metric]) -> ReportSummary {
    debug!("pushing {} metrics...", metrics.len());

    let mut summary = ReportSummary::default();
    for metric in metrics {
        match metric.value {
            Some(value) if !value.is_nan() => {
                sink.report_metric(&metric.name, metric.value_type, value);
                summary.pushed += 1;
            }
            _ => summary.dropped += 1,
        }
    }

    debug!(pushed = summary.pushed, dropped = summary.dropped, "pushing metrics: done");
    summary
}

/// Sink writing every metric to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricSink for LogSink {
    fn report_metric(&self, name: &str, unit: ValueType, value: MetricValue) {
        info!(metric = name, unit = %unit, value = %value, "metric");
    }
}
