//! Index to name maps (ifIndex to ifName and friends) and their cache.

use crate::error::MapError;
use dashmap::DashMap;
use poller_schema::Resolver;
use poller_snmp::Session;
use poller_types::{Node, SnmpValue};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Two-way map between row index and row name, built from one column.
///
/// The two directions are exact inverses: a name seen twice keeps its
/// first index and the later row is left out.
#[derive(Debug, Clone)]
pub struct IndexMap {
    index_to_name: BTreeMap<u32, String>,
    name_to_index: HashMap<String, u32>,
    source: Node,
    built_at: Instant,
}

impl IndexMap {
    pub fn new(source: Node) -> Self {
        Self {
            index_to_name: BTreeMap::new(),
            name_to_index: HashMap::new(),
            source,
            built_at: Instant::now(),
        }
    }

    /// Adds a row. Returns false if the index or the name is already taken.
    pub fn insert(&mut self, index: u32, name: String) -> bool {
        if self.index_to_name.contains_key(&index) {
            return false;
        }
        if let Some(first) = self.name_to_index.get(&name) {
            warn!(
                column = %self.source.name,
                name = %name,
                first = *first,
                duplicate = index,
                "duplicate name in index map, keeping first index"
            );
            return false;
        }
        self.name_to_index.insert(name.clone(), index);
        self.index_to_name.insert(index, name);
        true
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.index_to_name.get(&index).map(String::as_str)
    }

    pub fn index(&self, name: &str) -> Option<u32> {
        self.name_to_index.get(name).copied()
    }

    /// Rows in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.index_to_name.iter().map(|(i, n)| (*i, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.index_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_name.is_empty()
    }

    /// The column the map was built from.
    pub fn source(&self) -> &Node {
        &self.source
    }

    pub fn built_at(&self) -> Instant {
        self.built_at
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }
}

/// Walks `column` on the session's target and builds its index map.
///
/// Every reply must sit exactly one arc below the column; anything else
/// is a malformed reply and fails the build.
pub async fn build_index_map(
    session: &mut Session,
    resolver: &Resolver,
    column: &str,
) -> Result<IndexMap, MapError> {
    let node = resolver.lookup(column)?;
    if node.numeric.is_empty() {
        return Err(MapError::EmptyColumn {
            column: column.to_string(),
        });
    }

    let started = Instant::now();
    let mut map = IndexMap::new(node.clone());
    let mut malformed = None;
    let walked = session
        .bulk_walk(std::slice::from_ref(&node), |vb| {
            let index = match vb.oid.suffix_after(&node.numeric) {
                Some([index]) => *index,
                _ => {
                    malformed = Some(MapError::MalformedReply {
                        column: node.name.clone(),
                        oid: vb.oid.to_string(),
                    });
                    anyhow::bail!("malformed reply for {}", vb.oid);
                }
            };
            let name = match &vb.value {
                SnmpValue::OctetString(octets) => String::from_utf8_lossy(octets).into_owned(),
                other => other.to_string(),
            };
            map.insert(index, name);
            Ok(())
        })
        .await;

    if let Some(err) = malformed {
        return Err(err);
    }
    walked?;

    debug!(
        target = session.target(),
        column = %node.name,
        elements = map.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "index map built"
    );
    Ok(map)
}

/// Index maps per target and key, valid for `max_age` after they were
/// built.
#[derive(Debug)]
pub struct IndexMapCache {
    maps: DashMap<String, HashMap<String, Arc<IndexMap>>>,
    max_age: Duration,
}

impl IndexMapCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            maps: DashMap::new(),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Returns the cached map if it is no older than `max_age`. A stale
    /// map is dropped.
    pub fn get_fresh(&self, target: &str, key: &str) -> Option<Arc<IndexMap>> {
        let mut entry = self.maps.get_mut(target)?;
        let map = entry.get(key)?;
        if map.age() <= self.max_age {
            return Some(Arc::clone(map));
        }
        debug!(target = %target, key, age_s = map.age().as_secs(), "index map expired");
        entry.remove(key);
        None
    }

    /// Stores `map`, replacing any previous one for the same target and key.
    pub fn insert(&self, target: &str, key: &str, map: IndexMap) -> Arc<IndexMap> {
        let map = Arc::new(map);
        self.maps
            .entry(target.to_string())
            .or_default()
            .insert(key.to_string(), Arc::clone(&map));
        map
    }

    /// Drops one key, or every key when `key` is `None`. Returns the number
    /// of maps removed.
    pub fn clear(&self, target: &str, key: Option<&str>) -> usize {
        match key {
            None => self.maps.remove(target).map(|(_, m)| m.len()).unwrap_or(0),
            Some(key) => match self.maps.get_mut(target) {
                Some(mut entry) => usize::from(entry.remove(key).is_some()),
                None => 0,
            },
        }
    }

    /// Number of maps cached for `target`.
    pub fn len(&self, target: &str) -> usize {
        self.maps.get(target).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poller_schema::{ModuleSource, Schema};
    use poller_snmp::{MemoryAgent, SnmpError, BULK_MAX_REPETITIONS};
    use poller_types::{ObjectKind, Oid};
    use pretty_assertions::assert_eq;

    const IF_NAME: &str = "1.3.6.1.2.1.31.1.1.1.1";

    fn resolver() -> Resolver {
        let src = ModuleSource::from_yaml_str(
            r#"
module: IF-MIB
objects:
  - name: ifXEntry
    oid: 1.3.6.1.2.1.31.1.1.1
    kind: row
  - name: ifName
    oid: ifXEntry.1
    kind: column
    type: OctetString
"#,
        )
        .unwrap();
        Resolver::new(Schema::from_sources([src]).unwrap())
    }

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn agent_with(rows: &[(&str, &str)]) -> MemoryAgent {
        let agent = MemoryAgent::new();
        for (path, name) in rows {
            agent.insert(oid(path), SnmpValue::OctetString(name.as_bytes().to_vec()));
        }
        for i in 1..=BULK_MAX_REPETITIONS {
            agent.insert(oid(&format!("1.3.6.1.6.3.1.1.6.{}", i)), SnmpValue::Integer(0));
        }
        agent
    }

    fn source() -> Node {
        Node {
            key: "ifName".into(),
            name: "ifName".into(),
            module: "IF-MIB".into(),
            numeric: oid(IF_NAME),
            qualified: None,
            kind: ObjectKind::Column,
            type_info: None,
            lookedup: true,
        }
    }

    #[test]
    fn test_maps_are_inverse() {
        let mut map = IndexMap::new(source());
        assert!(map.insert(1, "ge-0/0/0".into()));
        assert!(map.insert(2, "xe-0/0/0".into()));
        assert!(!map.insert(3, "ge-0/0/0".into()));
        assert!(!map.insert(1, "lo0".into()));

        assert_eq!(map.len(), 2);
        for (index, name) in map.iter() {
            assert_eq!(map.index(name), Some(index));
            assert_eq!(map.name(index), Some(name));
        }
        assert_eq!(map.name(3), None);
    }

    #[tokio::test]
    async fn test_build_from_walk() {
        let agent = agent_with(&[
            ("1.3.6.1.2.1.31.1.1.1.1.1", "ge-0/0/0"),
            ("1.3.6.1.2.1.31.1.1.1.1.2", "xe-0/0/0"),
            ("1.3.6.1.2.1.31.1.1.1.1.17", "ae0"),
        ]);
        let mut session = Session::new("10.0.0.1", agent.transport());
        let map = build_index_map(&mut session, &resolver(), "ifName")
            .await
            .unwrap();

        let rows: Vec<(u32, &str)> = map.iter().collect();
        assert_eq!(rows, vec![(1, "ge-0/0/0"), (2, "xe-0/0/0"), (17, "ae0")]);
        assert_eq!(map.source().name, "ifName");
    }

    #[tokio::test]
    async fn test_build_rejects_multi_arc_index() {
        let agent = agent_with(&[
            ("1.3.6.1.2.1.31.1.1.1.1.1", "ge-0/0/0"),
            ("1.3.6.1.2.1.31.1.1.1.1.2.5", "odd"),
        ]);
        let mut session = Session::new("10.0.0.1", agent.transport());
        let err = build_index_map(&mut session, &resolver(), "ifName")
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::MalformedReply { ref oid, .. } if oid == "1.3.6.1.2.1.31.1.1.1.1.2.5"));
    }

    #[tokio::test]
    async fn test_build_unknown_column() {
        let agent = agent_with(&[]);
        let mut session = Session::new("10.0.0.1", agent.transport());
        let err = build_index_map(&mut session, &resolver(), "ifDescr")
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::Resolve(_)));
        assert!(agent.calls().is_empty());
    }

    #[tokio::test]
    async fn test_build_walk_failure() {
        let agent = agent_with(&[("1.3.6.1.2.1.31.1.1.1.1.1", "ge-0/0/0")]);
        agent.fail_with_status(5);
        let mut session = Session::new("10.0.0.1", agent.transport());
        let err = build_index_map(&mut session, &resolver(), "ifName")
            .await
            .unwrap_err();
        assert!(matches!(err, MapError::Walk(SnmpError::ErrorStatus { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_aging() {
        let max_age = Duration::from_secs(3600);
        let cache = IndexMapCache::new(max_age);
        cache.insert("10.0.0.1", "ifName", IndexMap::new(source()));

        tokio::time::advance(max_age - Duration::from_secs(1)).await;
        assert!(cache.get_fresh("10.0.0.1", "ifName").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get_fresh("10.0.0.1", "ifName").is_none());
        assert_eq!(cache.len("10.0.0.1"), 0);
    }

    #[test]
    fn test_cache_clear() {
        let cache = IndexMapCache::new(Duration::from_secs(60));
        cache.insert("10.0.0.1", "ifName", IndexMap::new(source()));
        cache.insert("10.0.0.1", "ifDescr", IndexMap::new(source()));
        cache.insert("10.0.0.2", "ifName", IndexMap::new(source()));

        assert_eq!(cache.clear("10.0.0.1", Some("ifDescr")), 1);
        assert_eq!(cache.clear("10.0.0.1", Some("ifDescr")), 0);
        assert_eq!(cache.len("10.0.0.1"), 1);
        assert_eq!(cache.clear("10.0.0.1", None), 1);
        assert_eq!(cache.len("10.0.0.2"), 1);
        assert_eq!(cache.clear("10.0.0.3", None), 0);
    }
}
