//! Jolokia connector
//!
//! Talks to the Jolokia JVM agent (JMX over HTTP/JSON) exposed by each
//! Cassandra node on the management port:
//! - `version` checks reachability when the connection opens
//! - `search` resolves selectors to live MBean names
//! - `read` fetches one attribute

use crate::connection::{AttributeValue, Connector, ManagementConnection};
use crate::error::{ConnectionError, QueryError};
use crate::object_name::ObjectName;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct JolokiaReply {
    status: u16,
    #[serde(default)]
    value: Value,
    error_type: Option<String>,
    error: Option<String>,
}

/// Opens [`JolokiaConnection`]s sharing one HTTP client
#[derive(Clone)]
pub struct JolokiaConnector {
    client: reqwest::Client,
}

impl JolokiaConnector {
    /// `request_timeout` bounds every single HTTP exchange
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Connector for JolokiaConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ManagementConnection>, ConnectionError> {
        let connection = JolokiaConnection {
            client: self.client.clone(),
            host: host.to_string(),
            url: endpoint_url(host, port),
        };

        match connection.request(json!({ "type": "version" }), "version").await {
            Ok(reply) => {
                debug!(host = %host, agent = %reply["agent"], "jolokia agent reachable");
                Ok(Box::new(connection))
            }
            Err(QueryError::Connection(e)) => Err(e),
            Err(e) => Err(ConnectionError::new(host, e.to_string())),
        }
    }
}

pub struct JolokiaConnection {
    client: reqwest::Client,
    host: String,
    url: String,
}

impl JolokiaConnection {
    async fn request(&self, body: Value, object: &str) -> Result<Value, QueryError> {
        let transport = |e: reqwest::Error| QueryError::Connection(ConnectionError::new(&self.host, e.to_string()));

        let response = self.client.post(&self.url).json(&body).send().await.map_err(transport)?;
        let response = response.error_for_status().map_err(transport)?;
        let reply: JolokiaReply = response.json().await.map_err(transport)?;

        interpret(reply, object, body["attribute"].as_str())
    }
}

#[async_trait]
impl ManagementConnection for JolokiaConnection {
    fn host(&self) -> &str {
        &self.host
    }

    async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError> {
        let pattern = selector.to_string();
        let value = self
            .request(json!({ "type": "search", "mbean": pattern }), &pattern)
            .await?;

        let Value::Array(names) = value else {
            return Err(QueryError::Rejected {
                object: pattern,
                message: "search reply is not a list".into(),
            });
        };

        let mut matches = Vec::with_capacity(names.len());
        for name in names.iter().filter_map(Value::as_str) {
            let name: ObjectName = name.parse().map_err(|e: crate::error::ObjectNameError| QueryError::Rejected {
                object: pattern.clone(),
                message: e.to_string(),
            })?;
            if selector.matches(&name) {
                matches.push(name);
            }
        }
        Ok(matches)
    }

    async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError> {
        let mbean = object.to_string();
        let value = self
            .request(json!({ "type": "read", "mbean": mbean, "attribute": attribute }), &mbean)
            .await?;
        Ok(attribute_value(value))
    }
}

/// `http://<host>:<port>/jolokia/`, keeping a port already present in `host`
fn endpoint_url(host: &str, port: u16) -> String {
    let is_port = |p: &str| p.parse::<u16>().is_ok();

    let has_port = match host.strip_prefix('[') {
        // `[v6]` or `[v6]:port`
        Some(bracketed) => matches!(bracketed.split_once("]:"), Some((_, p)) if is_port(p)),
        None => matches!(host.rsplit_once(':'), Some((h, p)) if !h.contains(':') && is_port(p)),
    };

    if has_port {
        format!("http://{host}/jolokia/")
    } else if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}/jolokia/")
    } else {
        format!("http://{host}:{port}/jolokia/")
    }
}

/// Map an in-body Jolokia status to a query result
fn interpret(reply: JolokiaReply, object: &str, attribute: Option<&str>) -> Result<Value, QueryError> {
    if reply.status == 200 {
        return Ok(reply.value);
    }

    let error_type = reply.error_type.unwrap_or_default();
    let message = reply.error.unwrap_or_else(|| format!("status {}", reply.status));
    if error_type.ends_with("InstanceNotFoundException") {
        Err(QueryError::NotFound(object.to_string()))
    } else if error_type.ends_with("AttributeNotFoundException") {
        Err(QueryError::MissingAttribute {
            object: object.to_string(),
            attribute: attribute.unwrap_or_default().to_string(),
        })
    } else {
        Err(QueryError::Rejected {
            object: object.to_string(),
            message,
        })
    }
}

fn attribute_value(value: Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Number(n) => match n.as_i64() {
            Some(v) => i32::try_from(v).map(AttributeValue::Int).unwrap_or(AttributeValue::Long(v)),
            None => AttributeValue::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        // non-finite doubles travel as strings
        Value::String(s) if matches!(s.as_str(), "NaN" | "Infinity" | "-Infinity") => {
            AttributeValue::Double(s.parse().unwrap_or(f64::NAN))
        }
        Value::String(s) => AttributeValue::Text(s),
        Value::Array(items) => AttributeValue::TextList(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        other => AttributeValue::Text(other.to_string()),
    }
}
