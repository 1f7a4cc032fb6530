//! Target credentials and per-target exclusivity.

use crate::config::InventoryConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Connection details for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub address: String,
    pub community: String,
}

/// Source of per-target credentials.
pub trait Inventory: Send + Sync {
    fn host(&self, target: &str) -> Host;
}

/// Inventory backed by the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    default_community: String,
    hosts: BTreeMap<String, String>,
}

impl StaticInventory {
    pub fn new(default_community: impl Into<String>) -> Self {
        Self {
            default_community: default_community.into(),
            hosts: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &InventoryConfig) -> Self {
        Self {
            default_community: config.default_community.clone(),
            hosts: config.hosts.clone(),
        }
    }

    pub fn with_host(mut self, target: impl Into<String>, community: impl Into<String>) -> Self {
        self.hosts.insert(target.into(), community.into());
        self
    }
}

impl Inventory for StaticInventory {
    fn host(&self, target: &str) -> Host {
        let community = self
            .hosts
            .get(target)
            .unwrap_or(&self.default_community)
            .clone();
        Host {
            address: target.to_string(),
            community,
        }
    }
}

/// Set of targets with a run in progress.
#[derive(Debug, Default)]
pub struct HostLocks {
    active: DashMap<String, ()>,
}

/// Releases the target's lock when dropped.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct HostGuard<'a> {
    locks: &'a HostLocks,
    target: String,
}

impl HostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks `target` unless it is already locked. Never waits.
    pub fn try_lock(&self, target: &str) -> Option<HostGuard<'_>> {
        match self.active.entry(target.to_string()) {
            Entry::Occupied(_) => {
                debug!(target = %target, "target still locked, refusing to start more runs");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(HostGuard {
                    locks: self,
                    target: target.to_string(),
                })
            }
        }
    }

    pub fn is_locked(&self, target: &str) -> bool {
        self.active.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl HostGuard<'_> {
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for HostGuard<'_> {
    fn drop(&mut self) {
        self.locks.active.remove(&self.target);
    }
}
