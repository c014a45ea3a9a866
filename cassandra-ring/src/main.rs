//! Cassandra Ring agent binary
//!
//! Loads the configuration, wires Jolokia + sink, then runs one poll cycle
//! per tick until interrupted.

use anyhow::{Context, Result};
use cassandra_ring::jolokia::JolokiaConnector;
use cassandra_ring::mqtt_sink::MqttSink;
use cassandra_ring::{AgentConfig, CassandraRing, ConnectorRingDiscovery, CycleSettings, LogSink, MetricSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn spawn_mqtt_loop(mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cassandra_ring=info")),
        )
        .init();

    let path = AgentConfig::config_path();
    let config = AgentConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(
        "Cassandra Ring agent starting for '{}' (discovery: {}:{})",
        config.name, config.discovery_host, config.jmx_port
    );

    let connector = Arc::new(
        JolokiaConnector::new(config.connect_timeout() + config.collect_timeout())
            .context("Failed to build HTTP client")?,
    );
    let discovery = Arc::new(ConnectorRingDiscovery::new(connector.clone()));

    let sink: Arc<dyn MetricSink> = match &config.mqtt {
        Some(mqtt) => {
            let (sink, eventloop) = MqttSink::new(mqtt, &config.name);
            spawn_mqtt_loop(eventloop);
            info!("Publishing metrics to mqtt://{}:{}/{}", mqtt.host, mqtt.port, mqtt.topic);
            Arc::new(sink)
        }
        None => Arc::new(LogSink),
    };

    let ring = CassandraRing::new(CycleSettings::from(&config), discovery, connector, sink);

    ring.run_until(config.poll_interval(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;
    info!("Shutting down");

    Ok(())
}
