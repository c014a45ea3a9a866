//! Attribute query façade
//!
//! Resolves a selector to exactly one live MBean and reads one attribute as a
//! typed value. Every failure is returned to the caller untouched.

use crate::connection::{AttributeValue, ManagementConnection};
use crate::error::QueryError;
use crate::object_name::ObjectName;
use crate::units::LatencyUnit;

/// Typed extraction from an [`AttributeValue`].
///
/// `Option<T>` accepts a null attribute; plain `T` rejects it.
pub trait FromAttribute: Sized {
    const EXPECTED: &'static str;

    /// `None` when the value has the wrong shape
    fn from_attribute(value: AttributeValue) -> Option<Self>;
}

impl FromAttribute for f64 {
    const EXPECTED: &'static str = "double";

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Int(v) => Some(v.into()),
            AttributeValue::Long(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromAttribute for i32 {
    const EXPECTED: &'static str = "int";

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Int(v) => Some(v),
            AttributeValue::Long(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromAttribute for i64 {
    const EXPECTED: &'static str = "long";

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Long(v) => Some(v),
            AttributeValue::Int(v) => Some(v.into()),
            _ => None,
        }
    }
}

impl FromAttribute for Vec<String> {
    const EXPECTED: &'static str = "text list";

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::TextList(v) => Some(v),
            _ => None,
        }
    }
}

impl FromAttribute for String {
    const EXPECTED: &'static str = "text";

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: FromAttribute> FromAttribute for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_attribute(value: AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Null => Some(None),
            other => T::from_attribute(other).map(Some),
        }
    }
}

/// Resolve `selector` to a single live MBean and read `attribute` from it
pub async fn query_attribute<T: FromAttribute>(
    connection: &dyn ManagementConnection,
    selector: &ObjectName,
    attribute: &str,
) -> Result<T, QueryError> {
    let mut names = connection.query_names(selector).await?;
    let object = match names.len() {
        0 => return Err(QueryError::NotFound(selector.to_string())),
        1 => names.remove(0),
        count => {
            return Err(QueryError::Ambiguous {
                pattern: selector.to_string(),
                count,
            })
        }
    };

    let value = connection.get_attribute(&object, attribute).await?;
    let found = value.kind();
    let is_null = matches!(value, AttributeValue::Null);

    T::from_attribute(value).ok_or_else(|| {
        if is_null {
            QueryError::Null {
                object: object.to_string(),
                attribute: attribute.to_string(),
            }
        } else {
            QueryError::UnexpectedType {
                object: object.to_string(),
                attribute: attribute.to_string(),
                expected: T::EXPECTED,
                found,
            }
        }
    })
}

/// Convenience form: `domain:type=<type>,scope=<scope>,name=<name>`
pub async fn query_scoped<T: FromAttribute>(
    connection: &dyn ManagementConnection,
    domain: &str,
    type_: &str,
    scope: Option<&str>,
    name: Option<&str>,
    attribute: &str,
) -> Result<T, QueryError> {
    query_attribute(connection, &ObjectName::scoped(domain, type_, scope, name), attribute).await
}

/// Read a `LatencyUnit` attribute. A null or unknown unit name reads as
/// `None`, which the normalizer passes through.
pub async fn query_latency_unit(
    connection: &dyn ManagementConnection,
    selector: &ObjectName,
    attribute: &str,
) -> Result<Option<LatencyUnit>, QueryError> {
    let name: Option<String> = query_attribute(connection, selector, attribute).await?;
    Ok(name.as_deref().and_then(LatencyUnit::from_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionError;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapConnection {
        beans: HashMap<ObjectName, HashMap<String, AttributeValue>>,
        broken: bool,
    }

    impl MapConnection {
        fn new() -> Self {
            Self { beans: HashMap::new(), broken: false }
        }

        fn with(mut self, object: &str, attribute: &str, value: AttributeValue) -> Self {
            self.beans
                .entry(object.parse().unwrap())
                .or_default()
                .insert(attribute.to_string(), value);
            self
        }
    }

    #[async_trait]
    impl ManagementConnection for MapConnection {
        fn host(&self) -> &str {
            "test-host"
        }

        async fn query_names(&self, selector: &ObjectName) -> Result<Vec<ObjectName>, QueryError> {
            if self.broken {
                return Err(ConnectionError::new("test-host", "socket closed").into());
            }
            Ok(self.beans.keys().filter(|n| selector.matches(n)).cloned().collect())
        }

        async fn get_attribute(&self, object: &ObjectName, attribute: &str) -> Result<AttributeValue, QueryError> {
            self.beans
                .get(object)
                .and_then(|attrs| attrs.get(attribute))
                .cloned()
                .ok_or_else(|| QueryError::MissingAttribute {
                    object: object.to_string(),
                    attribute: attribute.to_string(),
                })
        }
    }

    const LATENCY: &str = "org.apache.cassandra.metrics:type=ClientRequest,scope=Read,name=Latency";

    #[tokio::test]
    async fn test_scoped_read() {
        let conn = MapConnection::new().with(LATENCY, "Mean", 12.5f64.into());
        let mean: f64 = query_scoped(&conn, "org.apache.cassandra.metrics", "ClientRequest", Some("Read"), Some("Latency"), "Mean")
            .await
            .unwrap();
        assert_eq!(mean, 12.5);
    }

    #[tokio::test]
    async fn test_latency_unit_read() {
        let conn = MapConnection::new()
            .with(LATENCY, "LatencyUnit", "MICROSECONDS".into())
            .with(LATENCY, "Odd", "NOT_A_UNIT".into());
        let selector: ObjectName = LATENCY.parse().unwrap();

        let unit = query_latency_unit(&conn, &selector, "LatencyUnit").await.unwrap();
        assert_eq!(unit, Some(LatencyUnit::Microseconds));
        let odd = query_latency_unit(&conn, &selector, "Odd").await.unwrap();
        assert_eq!(odd, None);
    }

    #[tokio::test]
    async fn test_not_found_and_ambiguous() {
        let conn = MapConnection::new()
            .with("d:type=Cache,scope=KeyCache,name=Size", "Value", 1i64.into())
            .with("d:type=Cache,scope=RowCache,name=Size", "Value", 2i64.into());

        let missing = query_attribute::<i64>(&conn, &ObjectName::new("d").key("type", "Nope"), "Value").await;
        assert!(matches!(missing, Err(QueryError::NotFound(_))));

        let wide = ObjectName::new("d").key("type", "Cache").pattern();
        let ambiguous = query_attribute::<i64>(&conn, &wide, "Value").await;
        assert!(matches!(ambiguous, Err(QueryError::Ambiguous { count: 2, .. })));
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let conn = MapConnection::new()
            .with("d:type=A", "Text", "hello".into())
            .with("d:type=A", "Nothing", AttributeValue::Null);
        let selector = ObjectName::new("d").key("type", "A");

        let wrong = query_attribute::<f64>(&conn, &selector, "Text").await;
        assert!(matches!(wrong, Err(QueryError::UnexpectedType { expected: "double", found: "text", .. })));

        let null = query_attribute::<i32>(&conn, &selector, "Nothing").await;
        assert!(matches!(null, Err(QueryError::Null { .. })));
        let nullable: Option<i32> = query_attribute(&conn, &selector, "Nothing").await.unwrap();
        assert_eq!(nullable, None);

        let absent = query_attribute::<i32>(&conn, &selector, "Missing").await;
        assert!(matches!(absent, Err(QueryError::MissingAttribute { .. })));
    }

    #[tokio::test]
    async fn test_connection_failure_propagates() {
        let mut conn = MapConnection::new().with("d:type=A", "V", 1i32.into());
        conn.broken = true;
        let err = query_attribute::<i32>(&conn, &ObjectName::new("d").key("type", "A"), "V")
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }
}
