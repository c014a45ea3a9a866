//! Error types, one enum per failure class

use std::path::PathBuf;

/// A management endpoint could not be reached
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection to {host} failed: {reason}")]
pub struct ConnectionError {
    pub host: String,
    pub reason: String,
}

impl ConnectionError {
    pub fn new(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            reason: reason.into(),
        }
    }
}

/// Malformed `domain:key=value,...` selector text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectNameError {
    #[error("object name has no domain separator: {0}")]
    MissingDomain(String),
    #[error("invalid key property '{property}' in {name}")]
    InvalidProperty { name: String, property: String },
    #[error("duplicate key '{key}' in {name}")]
    DuplicateKey { name: String, key: String },
}

/// Failure while reading one management attribute
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("no MBean matches {0}")]
    NotFound(String),
    #[error("{count} MBeans match {pattern}, expected exactly one")]
    Ambiguous { pattern: String, count: usize },
    #[error("attribute {attribute} not found on {object}")]
    MissingAttribute { object: String, attribute: String },
    #[error("attribute {attribute} on {object}: expected {expected}, got {found}")]
    UnexpectedType {
        object: String,
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("attribute {attribute} on {object} is null")]
    Null { object: String, attribute: String },
    #[error("request on {object} rejected: {message}")]
    Rejected { object: String, message: String },
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl QueryError {
    /// Whether the failure comes from the transport rather than the data
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Failure while resolving the ring membership
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("ring discovery unreachable: {0}")]
    Connection(#[from] ConnectionError),
    #[error("ring discovery failed: {0}")]
    Other(#[source] anyhow::Error),
}

/// Fatal poll cycle failure
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("poll cycle aborted on {endpoint}: {source}")]
    Discovery {
        endpoint: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
