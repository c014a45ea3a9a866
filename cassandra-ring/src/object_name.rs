//! MBean selector value type
//!
//! An [`ObjectName`] is a domain plus an ordered list of `key=value`
//! properties, rendered as `domain:key=value,key=value`. A pattern name also
//! matches MBeans carrying extra properties (`domain:type=Cache,*`).

use crate::error::ObjectNameError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
    pattern: bool,
}

impl ObjectName {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            properties: Vec::new(),
            pattern: false,
        }
    }

    /// Convenience selector used by most catalog entries:
    /// `domain:type=<type>,scope=<scope>,name=<name>`, skipping absent parts.
    pub fn scoped(domain: &str, type_: &str, scope: Option<&str>, name: Option<&str>) -> Self {
        Self::new(domain)
            .key("type", type_)
            .key_opt("scope", scope)
            .key_opt("name", name)
    }

    /// Append a property; a key already present is replaced in place
    pub fn key(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    pub fn key_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.key(key, value),
            None => self,
        }
    }

    /// Turn this name into a property-list pattern
    pub fn pattern(mut self) -> Self {
        self.pattern = true;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern
    }

    /// Whether `candidate` is selected by this name.
    ///
    /// Property order never matters. A non-pattern name requires the exact
    /// same property set; a pattern only requires its own properties.
    pub fn matches(&self, candidate: &ObjectName) -> bool {
        if self.domain != candidate.domain {
            return false;
        }
        let own_match = self
            .properties
            .iter()
            .all(|(k, v)| candidate.get(k) == Some(v.as_str()));
        own_match && (self.pattern || self.properties.len() == candidate.properties.len())
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (k, v) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        if self.pattern {
            f.write_str(if first { "*" } else { ",*" })?;
        }
        Ok(())
    }
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, rest) = s
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingDomain(s.to_string()))?;
        let mut name = ObjectName::new(domain);

        for property in rest.split(',').filter(|p| !p.is_empty()) {
            if property == "*" {
                name.pattern = true;
                continue;
            }
            let (key, value) = property
                .split_once('=')
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| ObjectNameError::InvalidProperty {
                    name: s.to_string(),
                    property: property.to_string(),
                })?;
            if name.get(key).is_some() {
                return Err(ObjectNameError::DuplicateKey {
                    name: s.to_string(),
                    key: key.to_string(),
                });
            }
            name.properties.push((key.to_string(), value.to_string()));
        }

        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_selector() {
        let name = ObjectName::scoped("org.apache.cassandra.metrics", "ClientRequest", Some("Read"), Some("Latency"));
        assert_eq!(
            name.to_string(),
            "org.apache.cassandra.metrics:type=ClientRequest,scope=Read,name=Latency"
        );

        let stage = ObjectName::scoped("org.apache.cassandra.request", "ReadStage", None, None);
        assert_eq!(stage.to_string(), "org.apache.cassandra.request:type=ReadStage");
    }

    #[test]
    fn test_irregular_keys() {
        let name = ObjectName::new("org.apache.cassandra.metrics")
            .key("type", "ThreadPools")
            .key("path", "internal")
            .key("scope", "MemtablePostFlusher")
            .key("name", "PendingTasks");
        assert_eq!(name.get("path"), Some("internal"));
        assert_eq!(name.properties().len(), 4);
    }

    #[test]
    fn test_matching_ignores_order() {
        let wanted = ObjectName::new("d").key("type", "Cache").key("scope", "KeyCache");
        let live: ObjectName = "d:scope=KeyCache,type=Cache".parse().unwrap();
        assert!(wanted.matches(&live));

        let wider: ObjectName = "d:scope=KeyCache,type=Cache,name=Size".parse().unwrap();
        assert!(!wanted.matches(&wider));
        assert!(wanted.clone().pattern().matches(&wider));
        assert!(!wanted.matches(&"other:scope=KeyCache,type=Cache".parse().unwrap()));
    }

    #[test]
    fn test_parse_and_display() {
        let name: ObjectName = "org.apache.cassandra.net:type=FailureDetector".parse().unwrap();
        assert_eq!(name.domain(), "org.apache.cassandra.net");
        assert_eq!(name.get("type"), Some("FailureDetector"));
        assert!(!name.is_pattern());

        let pattern: ObjectName = "org.apache.cassandra.metrics:type=Cache,*".parse().unwrap();
        assert!(pattern.is_pattern());
        assert_eq!(pattern.to_string(), "org.apache.cassandra.metrics:type=Cache,*");
        assert_eq!(ObjectName::new("d").pattern().to_string(), "d:*");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("nodomain".parse::<ObjectName>(), Err(ObjectNameError::MissingDomain(_))));
        assert!(matches!("d:type".parse::<ObjectName>(), Err(ObjectNameError::InvalidProperty { .. })));
        assert!(matches!("d:type=a,type=b".parse::<ObjectName>(), Err(ObjectNameError::DuplicateKey { .. })));
    }

    #[test]
    fn test_key_replaces_existing() {
        let name = ObjectName::new("d").key("type", "a").key("type", "b");
        assert_eq!(name.to_string(), "d:type=b");
    }
}
