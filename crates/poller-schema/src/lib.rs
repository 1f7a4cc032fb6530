//! Schema handling for the SNMP poller.
//!
//! Schema modules are YAML documents describing named objects, their
//! numeric paths and their types. This crate loads them from a list of
//! search paths into a [`Schema`], resolves symbolic or numeric identifiers
//! into [`poller_types::Node`]s through a memoizing [`Resolver`], and
//! renders raw protocol values into typed metric values.
//!
//! # Example
//!
//! ```ignore
//! use poller_schema::{Resolver, Schema};
//!
//! let schema = Schema::load(&["schema"], &["IF-MIB"])?;
//! let resolver = Resolver::new(schema);
//! let node = resolver.lookup("ifName.3")?;
//! assert_eq!(node.request_oid().to_string(), "1.3.6.1.2.1.31.1.1.1.1.3");
//! ```

mod error;
mod format;
mod hint;
mod module;
mod resolver;
mod schema;

pub use error::{ResolveError, Result, SchemaError};
pub use hint::render_octets;
pub use module::{ModuleSource, ObjectDef, TypeDef};
pub use resolver::Resolver;
pub use schema::{Schema, SchemaLoader, SchemaObject};
