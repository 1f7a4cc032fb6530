//! Order dispatch.
//!
//! [`Engine::run`] carries one order from admission to the sink:
//!
//! 1. lock the target (never waits; a busy target fails the order)
//! 2. `ClearMap` drops cached index maps and stops here
//! 3. open a session with the order's community or the inventory default
//! 4. `BuildMap` rebuilds the index map and stops here
//! 5. fetch the index map if a key is in play, resolve every identifier
//! 6. walk, get (bare scalars as their `.0` instance), or get per
//!    matching element
//! 7. shape the replies and send one record
//!
//! The lock is released and the session finalized on every exit path.

use crate::error::EngineError;
use crate::index_map::{build_index_map, IndexMap, IndexMapCache};
use crate::inventory::{HostLocks, Inventory};
use crate::order::{Mode, Order, DEFAULT_MAP_KEY};
use crate::record::{Metadata, ResultRecord};
use crate::shape::ReplyShaper;
use crate::sink::Sink;
use async_trait::async_trait;
use poller_schema::Resolver;
use poller_snmp::{Connector, Session};
use poller_types::{Node, VarBind};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Something that can carry out orders.
#[async_trait]
pub trait OrderRunner: Send + Sync {
    async fn run(&self, order: &Order) -> Result<(), EngineError>;
}

/// Shared state for all workers: resolver, index maps, target locks and
/// the collaborators that reach the outside world.
pub struct Engine {
    resolver: Arc<Resolver>,
    connector: Arc<dyn Connector>,
    inventory: Arc<dyn Inventory>,
    sink: Arc<dyn Sink>,
    locks: HostLocks,
    maps: IndexMapCache,
}

impl Engine {
    pub fn new(
        resolver: Arc<Resolver>,
        connector: Arc<dyn Connector>,
        inventory: Arc<dyn Inventory>,
        sink: Arc<dyn Sink>,
        max_map_age: Duration,
    ) -> Self {
        Self {
            resolver,
            connector,
            inventory,
            sink,
            locks: HostLocks::new(),
            maps: IndexMapCache::new(max_map_age),
        }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn maps(&self) -> &IndexMapCache {
        &self.maps
    }

    pub fn locks(&self) -> &HostLocks {
        &self.locks
    }

    #[instrument(skip(self, order), fields(target = %order.target, mode = %order.mode))]
    pub async fn run(&self, order: &Order) -> Result<(), EngineError> {
        let target = order.target.as_str();
        let _guard = self
            .locks
            .try_lock(target)
            .ok_or_else(|| EngineError::HostLocked {
                target: target.to_string(),
            })?;

        if order.mode == Mode::ClearMap {
            let removed = self.maps.clear(target, order.map_key());
            info!(target = %target, key = order.map_key(), removed, "index maps cleared");
            return Ok(());
        }

        let host = self.inventory.host(target);
        let community = order.community_override().unwrap_or(&host.community);
        let mut session = Session::connect(self.connector.as_ref(), &host.address, community)
            .await
            .map_err(|source| EngineError::Session {
                target: target.to_string(),
                source,
            })?;

        let result = self.run_session(order, &mut session).await;
        session.finalize().await;
        result
    }

    async fn run_session(&self, order: &Order, session: &mut Session) -> Result<(), EngineError> {
        let target = order.target.as_str();

        if order.mode == Mode::BuildMap {
            let key = order.map_key().unwrap_or(DEFAULT_MAP_KEY);
            self.maps.clear(target, Some(key));
            let map = self.index_map(session, target, key).await?;
            info!(target = %target, key, elements = map.len(), "index map rebuilt");
            return Ok(());
        }

        let patterns = order
            .elements
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| EngineError::InvalidElementPattern {
                    target: target.to_string(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let key = match order.map_key() {
            Some(key) => Some(key),
            None if !patterns.is_empty() => Some(DEFAULT_MAP_KEY),
            None => None,
        };
        let map = match key {
            Some(key) => Some(self.index_map(session, target, key).await?),
            None => None,
        };

        let mut nodes = Vec::with_capacity(order.oids.len());
        let mut any_symbolic = false;
        for oid in &order.oids {
            let node = self.resolver.lookup(oid).map_err(|source| {
                warn!(target = %target, oid = %oid, error = %source, "unable to look up oid");
                EngineError::Resolve {
                    target: target.to_string(),
                    oid: oid.clone(),
                    source,
                }
            })?;
            any_symbolic |= node.lookedup;
            nodes.push(node);
        }
        let shape = order.result.effective(any_symbolic);
        if nodes.is_empty() {
            return Err(EngineError::NoOids {
                target: target.to_string(),
            });
        }

        let mut shaper = ReplyShaper::new(&self.resolver, shape, map.as_deref());
        let visit = |vb: VarBind| -> anyhow::Result<()> {
            shaper.visit(vb);
            Ok(())
        };
        let polled = match order.mode {
            Mode::Walk => session.bulk_walk(&nodes, visit).await,
            Mode::Get => {
                let instances: Vec<Node> = nodes.iter().map(scalar_instance).collect();
                session.get(&instances, visit).await
            }
            Mode::GetElements => {
                let instances = element_instances(&nodes, &patterns, map.as_deref());
                debug!(target = %target, instances = instances.len(), "elements matched");
                session.get(&instances, visit).await
            }
            Mode::BuildMap | Mode::ClearMap => Ok(()),
        };
        polled.map_err(|source| EngineError::Poll {
            target: target.to_string(),
            source,
        })?;

        let record = ResultRecord::new(
            Metadata {
                target: target.to_string(),
                id: order.id.clone(),
            },
            shaper.finish(),
        );
        debug!(target = %target, values = record.data.len(), ?shape, "sending record");
        self.sink
            .send(&record)
            .await
            .map_err(|source| EngineError::Send {
                target: target.to_string(),
                source,
            })
    }

    /// Cached index map for `target`/`key`, built through `session` when
    /// missing or expired.
    async fn index_map(
        &self,
        session: &mut Session,
        target: &str,
        key: &str,
    ) -> Result<Arc<IndexMap>, EngineError> {
        if let Some(map) = self.maps.get_fresh(target, key) {
            return Ok(map);
        }
        let map = build_index_map(session, &self.resolver, key)
            .await
            .map_err(|source| EngineError::IndexMap {
                target: target.to_string(),
                key: key.to_string(),
                source,
            })?;
        Ok(self.maps.insert(target, key, map))
    }
}

#[async_trait]
impl OrderRunner for Engine {
    async fn run(&self, order: &Order) -> Result<(), EngineError> {
        Engine::run(self, order).await
    }
}

/// A bare scalar is fetched as its `.0` instance.
fn scalar_instance(node: &Node) -> Node {
    let mut node = node.clone();
    if node.is_scalar() && node.instance().is_empty() {
        node.qualified = Some(node.numeric.child(0));
    }
    node
}

/// One concrete instance per identifier and index whose name matches any
/// pattern. Patterns are unanchored.
fn element_instances(nodes: &[Node], patterns: &[Regex], map: Option<&IndexMap>) -> Vec<Node> {
    let Some(map) = map else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut instances = Vec::new();
    for node in nodes {
        for pattern in patterns {
            for (index, name) in map.iter() {
                if !pattern.is_match(name) {
                    continue;
                }
                let path = node.request_oid().child(index);
                if !seen.insert(path.clone()) {
                    continue;
                }
                let mut instance = node.clone();
                instance.qualified = Some(path);
                instances.push(instance);
            }
        }
    }
    instances
}
