//! SNMP values as carried on the wire, and the typed scalars emitted downstream.

use crate::Oid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value carried in a variable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// Returns true for the three v2c exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }

    /// Returns the SMI name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            SnmpValue::Boolean(_) => "Boolean",
            SnmpValue::Integer(_) => "Integer",
            SnmpValue::OctetString(_) => "OctetString",
            SnmpValue::Null => "Null",
            SnmpValue::ObjectIdentifier(_) => "ObjectIdentifier",
            SnmpValue::IpAddress(_) => "IpAddress",
            SnmpValue::Counter32(_) => "Counter32",
            SnmpValue::Gauge32(_) => "Gauge32",
            SnmpValue::TimeTicks(_) => "TimeTicks",
            SnmpValue::Opaque(_) => "Opaque",
            SnmpValue::Counter64(_) => "Counter64",
            SnmpValue::NoSuchObject => "NoSuchObject",
            SnmpValue::NoSuchInstance => "NoSuchInstance",
            SnmpValue::EndOfMibView => "EndOfMibView",
        }
    }

    /// Returns the value as a signed integer when it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(i64::from(*v))
            }
            SnmpValue::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the raw bytes of string-like values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SnmpValue::OctetString(b) | SnmpValue::Opaque(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpValue::Boolean(b) => write!(f, "{}", b),
            SnmpValue::Integer(v) => write!(f, "{}", v),
            SnmpValue::OctetString(b) => f.write_str(&String::from_utf8_lossy(b)),
            SnmpValue::Null => f.write_str("NULL"),
            SnmpValue::ObjectIdentifier(oid) => write!(f, "{}", oid),
            SnmpValue::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                write!(f, "{}", v)
            }
            SnmpValue::Opaque(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            SnmpValue::Counter64(v) => write!(f, "{}", v),
            SnmpValue::NoSuchObject => f.write_str("noSuchObject"),
            SnmpValue::NoSuchInstance => f.write_str("noSuchInstance"),
            SnmpValue::EndOfMibView => f.write_str("endOfMibView"),
        }
    }
}

/// A single variable binding: an object path and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// A typed scalar as emitted in result records.
///
/// Serializes untagged, so records carry plain JSON strings, booleans and
/// numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Integer(i64),
    Unsigned(u64),
    Text(String),
}

impl MetricValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&SnmpValue> for MetricValue {
    /// Converts without any schema knowledge.
    fn from(value: &SnmpValue) -> Self {
        match value {
            SnmpValue::Boolean(b) => MetricValue::Bool(*b),
            SnmpValue::Integer(v) => MetricValue::Integer(*v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                MetricValue::Unsigned(u64::from(*v))
            }
            SnmpValue::Counter64(v) => MetricValue::Unsigned(*v),
            other => MetricValue::Text(other.to_string()),
        }
    }
}

impl From<String> for MetricValue {
    fn from(s: String) -> Self {
        MetricValue::Text(s)
    }
}

impl From<&str> for MetricValue {
    fn from(s: &str) -> Self {
        MetricValue::Text(s.to_string())
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Bool(b) => write!(f, "{}", b),
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Unsigned(v) => write!(f, "{}", v),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exceptions() {
        assert!(SnmpValue::NoSuchObject.is_exception());
        assert!(SnmpValue::NoSuchInstance.is_exception());
        assert!(SnmpValue::EndOfMibView.is_exception());
        assert!(!SnmpValue::Null.is_exception());
        assert!(!SnmpValue::Integer(0).is_exception());
    }

    #[test]
    fn test_raw_conversion() {
        assert_eq!(
            MetricValue::from(&SnmpValue::OctetString(b"router1".to_vec())),
            MetricValue::Text("router1".into())
        );
        assert_eq!(
            MetricValue::from(&SnmpValue::Counter64(u64::MAX)),
            MetricValue::Unsigned(u64::MAX)
        );
        assert_eq!(
            MetricValue::from(&SnmpValue::Integer(-3)),
            MetricValue::Integer(-3)
        );
        assert_eq!(
            MetricValue::from(&SnmpValue::IpAddress([10, 0, 0, 1])),
            MetricValue::Text("10.0.0.1".into())
        );
        assert_eq!(
            MetricValue::from(&SnmpValue::ObjectIdentifier("1.3.6.1".parse().unwrap())),
            MetricValue::Text("1.3.6.1".into())
        );
    }

    #[test]
    fn test_metric_value_json() {
        let values = vec![
            MetricValue::Bool(true),
            MetricValue::Integer(-1),
            MetricValue::Unsigned(42),
            MetricValue::Text("ge-0/0/0".into()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[true,-1,42,"ge-0/0/0"]"#);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(SnmpValue::Gauge32(7).as_i64(), Some(7));
        assert_eq!(SnmpValue::Counter64(u64::MAX).as_i64(), None);
        assert_eq!(SnmpValue::Null.as_i64(), None);
    }
}
