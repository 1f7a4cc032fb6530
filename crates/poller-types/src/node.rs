//! Resolved schema objects.

use crate::{Oid, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Underlying SMI type of an object or textual convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BaseType {
    #[default]
    Unknown,
    Integer32,
    Integer64,
    Unsigned32,
    Unsigned64,
    Counter32,
    Counter64,
    Gauge32,
    TimeTicks,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Opaque,
    Enum,
    Bits,
    Pointer,
}

impl BaseType {
    /// Returns true for base types whose values are emitted as numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BaseType::Integer32
                | BaseType::Integer64
                | BaseType::Unsigned32
                | BaseType::Unsigned64
                | BaseType::Counter32
                | BaseType::Counter64
                | BaseType::Gauge32
                | BaseType::TimeTicks
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Unknown => "Unknown",
            BaseType::Integer32 => "Integer32",
            BaseType::Integer64 => "Integer64",
            BaseType::Unsigned32 => "Unsigned32",
            BaseType::Unsigned64 => "Unsigned64",
            BaseType::Counter32 => "Counter32",
            BaseType::Counter64 => "Counter64",
            BaseType::Gauge32 => "Gauge32",
            BaseType::TimeTicks => "TimeTicks",
            BaseType::OctetString => "OctetString",
            BaseType::ObjectIdentifier => "ObjectIdentifier",
            BaseType::IpAddress => "IpAddress",
            BaseType::Opaque => "Opaque",
            BaseType::Enum => "Enum",
            BaseType::Bits => "Bits",
            BaseType::Pointer => "Pointer",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseType {
    type Err = ParseError;

    /// Accepts both the camel-case names and the ASN.1 spellings used in
    /// module sources (`OCTET STRING`, `INTEGER`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "unknown" => Ok(BaseType::Unknown),
            "integer" | "integer32" => Ok(BaseType::Integer32),
            "integer64" => Ok(BaseType::Integer64),
            "unsigned32" => Ok(BaseType::Unsigned32),
            "unsigned64" => Ok(BaseType::Unsigned64),
            "counter" | "counter32" => Ok(BaseType::Counter32),
            "counter64" => Ok(BaseType::Counter64),
            "gauge" | "gauge32" => Ok(BaseType::Gauge32),
            "timeticks" => Ok(BaseType::TimeTicks),
            "octetstring" => Ok(BaseType::OctetString),
            "objectidentifier" | "oid" => Ok(BaseType::ObjectIdentifier),
            "ipaddress" => Ok(BaseType::IpAddress),
            "opaque" => Ok(BaseType::Opaque),
            "enum" | "enumeration" => Ok(BaseType::Enum),
            "bits" => Ok(BaseType::Bits),
            "pointer" => Ok(BaseType::Pointer),
            _ => Err(ParseError::InvalidBaseType(s.to_string())),
        }
    }
}

impl TryFrom<String> for BaseType {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BaseType> for String {
    fn from(t: BaseType) -> String {
        t.as_str().to_string()
    }
}

/// Kind of a schema object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    #[default]
    Node,
    Scalar,
    Table,
    Row,
    Column,
    Notification,
}

impl FromStr for ObjectKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" => Ok(ObjectKind::Node),
            "scalar" => Ok(ObjectKind::Scalar),
            "table" => Ok(ObjectKind::Table),
            "row" => Ok(ObjectKind::Row),
            "column" => Ok(ObjectKind::Column),
            "notification" => Ok(ObjectKind::Notification),
            _ => Err(ParseError::InvalidObjectKind(s.to_string())),
        }
    }
}

/// Semantic type of a schema object after textual conventions are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeInfo {
    /// Name of the textual convention, if any.
    pub name: Option<String>,
    pub base: BaseType,
    /// DISPLAY-HINT string.
    pub format: Option<String>,
    pub enums: BTreeMap<i64, String>,
    pub bits: BTreeMap<u32, String>,
}

impl TypeInfo {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }

    pub fn enum_label(&self, value: i64) -> Option<&str> {
        self.enums.get(&value).map(String::as_str)
    }

    /// Returns the labels of all set bits, most significant bit of the
    /// first octet being bit 0. Unnamed set bits render as their number.
    pub fn bit_labels(&self, octets: &[u8]) -> Vec<String> {
        let mut labels = Vec::new();
        for (i, byte) in octets.iter().enumerate() {
            for shift in 0..8u32 {
                if byte & (0x80 >> shift) == 0 {
                    continue;
                }
                let bit = (i as u32) * 8 + shift;
                match self.bits.get(&bit) {
                    Some(label) => labels.push(label.clone()),
                    None => labels.push(bit.to_string()),
                }
            }
        }
        labels
    }
}

/// A resolved identifier.
///
/// Produced by the resolver and immutable afterwards. `numeric` is the
/// object's own path; `qualified` additionally carries the instance suffix
/// when the lookup input had one. Numeric inputs always carry their full
/// path in `qualified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// The original lookup string.
    pub key: String,
    pub name: String,
    pub module: String,
    pub numeric: Oid,
    pub qualified: Option<Oid>,
    pub kind: ObjectKind,
    pub type_info: Option<Arc<TypeInfo>>,
    /// True when the input was symbolic.
    pub lookedup: bool,
}

impl Node {
    /// Path to put on the wire: the qualified path when present, else the
    /// object path.
    pub fn request_oid(&self) -> &Oid {
        self.qualified.as_ref().unwrap_or(&self.numeric)
    }

    /// Arcs of the instance suffix carried by the lookup input.
    pub fn instance(&self) -> &[u32] {
        self.qualified
            .as_ref()
            .and_then(|q| q.suffix_after(&self.numeric))
            .unwrap_or(&[])
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == ObjectKind::Scalar
    }

    pub fn base_type(&self) -> BaseType {
        self.type_info.as_ref().map(|t| t.base).unwrap_or_default()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = self.instance();
        if instance.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.name, Oid::render_arcs(instance))
        }
    }
}
