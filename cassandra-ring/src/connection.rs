//! Management connection boundary
//!
//! The agent never speaks a wire protocol directly: a [`Connector`] opens one
//! [`ManagementConnection`] per host, and the connection answers MBean name
//! searches and attribute reads.

use crate::error::{ConnectionError, QueryError};
use crate::object_name::ObjectName;
use async_trait::async_trait;
use serde::Serialize;

/// Attribute value as returned by the remote management interface
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    TextList(Vec<String>),
}

impl AttributeValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
            Self::TextList(_) => "text list",
        }
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

/// An open session with one host's management interface
#[async_trait]
pub trait ManagementConnection: Send + Sync {
    /// Address of the host this connection talks to
    fn host(&self) -> &str;

    /// Names of the live MBeans selected by `selector`
    async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError>;

    /// Read one attribute of one MBean
    async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError>;

    /// Release the session. Called exactly once, on every exit path.
    async fn close(&self) {}
}

/// Opens management connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ManagementConnection>, ConnectionError>;
}
