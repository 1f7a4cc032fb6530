//! Common types for the SNMP poller.
//!
//! This crate provides the type-safe building blocks shared by the schema
//! resolver, the protocol session and the poller daemon:
//!
//! - [`Oid`]: dotted numeric object identifiers with SNMP ordering
//! - [`SnmpValue`] / [`VarBind`]: raw values as carried on the wire
//! - [`MetricValue`]: typed scalars emitted in result records
//! - [`Node`]: a resolved schema object, with its [`TypeInfo`] and [`ObjectKind`]

mod node;
mod oid;
mod value;

pub use node::{BaseType, Node, ObjectKind, TypeInfo};
pub use oid::Oid;
pub use value::{MetricValue, SnmpValue, VarBind};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid object identifier: {0:?}")]
    InvalidOid(String),

    #[error("invalid base type: {0}")]
    InvalidBaseType(String),

    #[error("invalid object kind: {0}")]
    InvalidObjectKind(String),
}
