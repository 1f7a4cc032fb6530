//! Memoizing identifier resolver.

use crate::error::ResolveError;
use crate::schema::Schema;
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use poller_types::{Node, Oid};
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NUMERIC_OID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.]+$").expect("valid regex"));

/// Resolves symbolic or numeric identifiers against a [`Schema`].
///
/// Results are cached by the exact input string for the lifetime of the
/// resolver. Concurrent lookups of the same input run at most one schema
/// query; lookups of different inputs proceed in parallel. Failures are
/// never cached.
#[derive(Debug)]
pub struct Resolver {
    schema: Arc<Schema>,
    cache: DashMap<String, Arc<OnceCell<Node>>>,
    queries: AtomicU64,
}

impl Resolver {
    pub fn new(schema: Schema) -> Self {
        Self::with_schema(Arc::new(schema))
    }

    pub fn with_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            cache: DashMap::new(),
            queries: AtomicU64::new(0),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of schema queries performed so far.
    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of cached identifiers.
    pub fn cached(&self) -> usize {
        self.cache.iter().filter(|e| e.value().get().is_some()).count()
    }

    /// Resolves `item`.
    ///
    /// Accepted forms: `1.3.6.1.2.1.1.5.0` (optionally with a leading dot),
    /// `sysName`, `sysName.0`, `SNMPv2-MIB::sysName.0`.
    pub fn lookup(&self, item: &str) -> Result<Node, ResolveError> {
        let cached = self
            .cache
            .get(item)
            .and_then(|entry| entry.value().get().cloned());
        if let Some(node) = cached {
            return Ok(node);
        }

        let cell = Arc::clone(self.cache.entry(item.to_string()).or_default().value());
        let result = cell.get_or_try_init(|| self.query(item)).cloned();
        if result.is_err() {
            self.cache.remove_if(item, |_, cell| cell.get().is_none());
        }
        result
    }

    /// Resolves a reply path without touching the cache.
    pub fn resolve_oid(&self, oid: &Oid) -> Result<Node, ResolveError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.node_for_oid(oid.to_string(), oid.clone())
    }

    fn query(&self, item: &str) -> Result<Node, ResolveError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if item.is_empty() {
            return Err(ResolveError::Empty);
        }

        let node = if NUMERIC_OID.is_match(item) {
            self.query_numeric(item)?
        } else {
            self.query_symbolic(item)?
        };
        debug!(
            key = item,
            name = %node.name,
            numeric = %node.numeric,
            "identifier resolved"
        );
        Ok(node)
    }

    fn query_numeric(&self, item: &str) -> Result<Node, ResolveError> {
        let oid: Oid = item.parse().map_err(|_| ResolveError::not_found(item))?;
        self.node_for_oid(item.to_string(), oid)
    }

    fn node_for_oid(&self, key: String, oid: Oid) -> Result<Node, ResolveError> {
        let (object, _) = self
            .schema
            .object_by_oid(&oid)
            .ok_or_else(|| ResolveError::not_found(key.as_str()))?;

        Ok(Node {
            key,
            name: object.name.clone(),
            module: object.module.clone(),
            numeric: object.oid.clone(),
            qualified: Some(oid),
            kind: object.kind,
            type_info: object.type_info.clone(),
            lookedup: false,
        })
    }

    fn query_symbolic(&self, item: &str) -> Result<Node, ResolveError> {
        let (base, suffix) = match item.split_once('.') {
            Some((base, suffix)) => (base, Some(suffix)),
            None => (item, None),
        };
        let object = self
            .schema
            .object(base)
            .ok_or_else(|| ResolveError::not_found(item))?;

        let qualified = match suffix {
            None => None,
            Some(suffix) => {
                let arcs = suffix
                    .split('.')
                    .map(str::parse::<u32>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| ResolveError::invalid_instance(item, suffix))?;
                Some(object.oid.join(&arcs))
            }
        };

        Ok(Node {
            key: item.to_string(),
            name: object.name.clone(),
            module: object.module.clone(),
            numeric: object.oid.clone(),
            qualified,
            kind: object.kind,
            type_info: object.type_info.clone(),
            lookedup: true,
        })
    }
}
