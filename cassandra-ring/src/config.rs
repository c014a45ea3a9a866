//! Agent configuration
//!
//! Read once at startup from a TOML file:
//! - Ring identity (`name`, `discovery_host`, `jmx_port`)
//! - Poll timing and per-host deadlines
//! - Optional MQTT sink settings

use crate::collector::FailurePolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "CASSANDRA_RING_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "cassandra-ring.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Display label of the monitored ring
    pub name: String,
    pub discovery_host: String,
    /// Management port shared by discovery and every host connection
    #[serde(default = "default_jmx_port", deserialize_with = "port_from_number_or_string")]
    pub jmx_port: u16,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_collect_timeout")]
    pub collect_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_hosts: usize,
    #[serde(default)]
    pub on_query_failure: FailurePolicy,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,
    pub client_id: Option<String>,
}

fn default_jmx_port() -> u16 {
    8778
}

fn default_poll_interval() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_collect_timeout() -> u64 {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "cassandra/metrics".to_string()
}

/// `jmx_port = 7199` and `jmx_port = "7199"` are both accepted
fn port_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {text}"))),
    }
}

impl AgentConfig {
    /// Path from `CASSANDRA_RING_CONFIG`, or `cassandra-ring.toml`
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AgentConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.discovery_host.trim().is_empty() {
            return Err(ConfigError::Invalid("discovery_host must not be empty".into()));
        }
        if self.jmx_port == 0 {
            return Err(ConfigError::Invalid("jmx_port must not be 0".into()));
        }
        if self.poll_interval_secs == 0 || self.connect_timeout_secs == 0 || self.collect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("intervals and timeouts must be at least 1s".into()));
        }
        if self.max_concurrent_hosts == 0 {
            return Err(ConfigError::Invalid("max_concurrent_hosts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.collect_timeout_secs)
    }
}
