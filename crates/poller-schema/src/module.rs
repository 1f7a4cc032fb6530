//! On-disk format of schema modules.
//!
//! ```yaml
//! module: IF-MIB
//! imports: [SNMPv2-TC, SNMPv2-MIB]
//! types:
//!   - name: InterfaceIndex
//!     base: Integer32
//!     hint: d
//! objects:
//!   - name: ifXTable
//!     oid: mib-2.31.1.1
//!     kind: table
//!   - name: ifName
//!     oid: ifXEntry.1
//!     kind: column
//!     type: DisplayString
//! ```
//!
//! Object paths are either fully numeric or `<earlier object>.<arcs>`.

use poller_types::ObjectKind;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A parsed module document.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSource {
    pub module: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

impl ModuleSource {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

/// A textual convention.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeDef {
    pub name: String,
    /// A base type name or another textual convention.
    pub base: String,
    #[serde(default)]
    pub hint: Option<String>,
    /// Enumeration labels to values.
    #[serde(default)]
    pub values: BTreeMap<String, i64>,
    /// Bit labels to bit positions.
    #[serde(default)]
    pub bits: BTreeMap<String, u32>,
}

/// A named object.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub oid: String,
    #[serde(default)]
    pub kind: ObjectKind,
    #[serde(default, rename = "type")]
    pub type_ref: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub values: BTreeMap<String, i64>,
    #[serde(default)]
    pub bits: BTreeMap<String, u32>,
}
