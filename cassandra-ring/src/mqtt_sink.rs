//! MQTT metric sink
//!
//! Each accepted metric becomes one JSON message on the configured topic.
//! Publishing never blocks the cycle: a full request queue drops the metric.

use crate::config::MqttConfig;
use crate::metric::{MetricValue, ValueType};
use crate::reporter::MetricSink;
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Wire format of one published metric
#[derive(Debug, Serialize)]
pub struct MetricMessage<'a> {
    pub component: &'a str,
    pub name: &'a str,
    pub unit: ValueType,
    pub value: MetricValue,
    pub timestamp: DateTime<Utc>,
}

pub struct MqttSink {
    client: AsyncClient,
    topic: String,
    component: String,
}

impl MqttSink {
    /// Build the sink and the event loop that must be polled for messages to
    /// leave the process
    pub fn new(config: &MqttConfig, component: &str) -> (Self, EventLoop) {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("cassandra-ring-{}", uuid::Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, 256);
        let sink = Self {
            client,
            topic: config.topic.clone(),
            component: component.to_string(),
        };
        (sink, eventloop)
    }
}

impl MetricSink for MqttSink {
    fn report_metric(&self, name: &str, unit: ValueType, value: MetricValue) {
        let message = MetricMessage {
            component: &self.component,
            name,
            unit,
            value,
            timestamp: Utc::now(),
        };

        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(metric = name, error = %e, "failed to serialize metric");
                return;
            }
        };

        if let Err(e) = self.client.try_publish(&self.topic, QoS::AtMostOnce, false, payload) {
            warn!(metric = name, error = %e, "failed to queue metric");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        let message = MetricMessage {
            component: "prod ring",
            name: "Cassandra/global/totalHosts",
            unit: ValueType::Count,
            value: MetricValue::Int(3),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["name"], "Cassandra/global/totalHosts");
        assert_eq!(json["unit"], "count");
        assert_eq!(json["value"], 3);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_publish_is_queued_without_broker() {
        let config = MqttConfig {
            host: "localhost".into(),
            port: 1883,
            topic: "cassandra/metrics".into(),
            client_id: Some("test-client".into()),
        };
        let (sink, mut eventloop) = MqttSink::new(&config, "ring");

        // nothing polls the event loop: the request only sits in the queue
        sink.report_metric("Cassandra/global/UpEndpointCount", ValueType::Count, MetricValue::Int(5));
        eventloop.clean();

        assert_eq!(eventloop.pending.len(), 1);
        let publish = match &eventloop.pending[0] {
            rumqttc::Request::Publish(publish) => publish,
            other => panic!("unexpected request: {other:?}"),
        };
        assert_eq!(publish.topic, "cassandra/metrics");
        assert_eq!(publish.qos, QoS::AtMostOnce);

        let json: serde_json::Value = serde_json::from_slice(&publish.payload).unwrap();
        assert_eq!(json["component"], "ring");
        assert_eq!(json["name"], "Cassandra/global/UpEndpointCount");
        assert_eq!(json["value"], 5);
    }
}
