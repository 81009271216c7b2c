//! # The node registry
//!
//! A concurrent index of nodes by [`NodeId`]. Lookups, reservations and
//! removals are safe from any thread, which lets nodes be prepared off the
//! simulation thread before they are attached. Everything that touches the
//! arena itself (registering, sweeping, pooling) runs on the simulation thread.
//!
//! Entries are strong while their node is enabled and weak while it is
//! disabled. A weak entry is only an arena key: it upgrades only while the key
//! is still valid, and [`Registry::sweep`] may reclaim the node behind it.

mod entry;
mod pool;

pub use entry::{Liveness, RegistryEntry};

use std::{
    any::TypeId,
    borrow::Cow,
    sync::Arc,
    time::Duration,
};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, warn};

use crate::{
    config::RegistryConfig,
    id::NodeId,
    node::{Component, NodeKey, state::NodeFlags},
};

/// What one [`Registry::sweep`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries dropped because their node is gone or unloaded.
    pub removed: usize,
    /// Nodes disposed by the sweep.
    pub reclaimed: usize,
    /// Pooled nodes disposed under memory pressure.
    pub pooled_dropped: usize,
    pub memory_pressure: bool,
}

pub struct Registry {
    entries: DashMap<NodeId, RegistryEntry, FxBuildHasher>,
    renderables: RwLock<IndexSet<NodeId, FxBuildHasher>>,
    pools: Mutex<FxHashMap<TypeId, Vec<NodeKey>>>,
    since_sweep: Mutex<Duration>,
    config: RegistryConfig,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.len())
            .field("renderables", &self.renderables.read().len())
            .field("config", &self.config)
            .finish()
    }
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Registry {
            entries: DashMap::with_hasher(FxBuildHasher),
            renderables: RwLock::new(IndexSet::with_hasher(FxBuildHasher)),
            pools: Mutex::new(FxHashMap::default()),
            since_sweep: Mutex::new(Duration::ZERO),
            config,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a mounted node under its id. Simulation thread only.
    ///
    /// Fills in a reservation for the same id. Another node already
    /// registered under the id is replaced, with a warning.
    pub fn register(self: &Arc<Self>, key: NodeKey) -> Option<NodeId> {
        let entry = key.write_state(|s| {
            s.registry = Some(Arc::downgrade(self));
            let enabled = s.flags.contains(NodeFlags::ENABLED);
            RegistryEntry {
                id: s.id,
                key: Some(key),
                kind: s.kind,
                kind_name: s.kind_name.clone(),
                liveness: Liveness::for_enabled(enabled),
                enabled,
                visible: s.flags.contains(NodeFlags::VISIBLE),
            }
        });
        let Some(entry) = entry else {
            warn!(node = %key, "registering a disposed node");
            return None;
        };
        let id = entry.id;
        if let Some(previous) = self.entries.insert(id, entry)
            && let Some(previous_key) = previous.key
            && previous_key != key
        {
            warn!(%id, node = %key, previous = %previous_key, "duplicate node id; registry entry replaced");
        }
        Some(id)
    }

    /// Register `root` and every node below it.
    pub fn register_tree(self: &Arc<Self>, root: NodeKey) -> usize {
        root.descendants()
            .into_iter()
            .filter_map(|key| self.register(key))
            .count()
    }

    /// Register a node and append it to the render order.
    pub fn register_renderable(self: &Arc<Self>, key: NodeKey) -> Option<NodeId> {
        let id = self.register(key)?;
        self.renderables.write().insert(id);
        Some(id)
    }

    /// Reserve `id` for a node of kind `T` that is not attached yet. Any thread.
    ///
    /// Returns `false` if the id is already taken.
    pub fn reserve<T: Component>(&self, id: NodeId) -> bool {
        let mut inserted = false;
        self.entries.entry(id).or_insert_with(|| {
            inserted = true;
            RegistryEntry {
                id,
                key: None,
                kind: Some(TypeId::of::<T>()),
                kind_name: Cow::Borrowed(std::any::type_name::<T>()),
                liveness: Liveness::Strong,
                enabled: true,
                visible: true,
            }
        });
        inserted
    }

    pub fn remove(&self, id: NodeId) -> Option<RegistryEntry> {
        let removed = self.entries.remove(&id).map(|(_, entry)| entry);
        if removed.is_some() {
            self.renderables.write().shift_remove(&id);
        }
        removed
    }

    /// Remove the entry for `id` only if it still refers to `key`.
    pub(crate) fn remove_key(&self, id: NodeId, key: NodeKey) -> bool {
        let removed = self
            .entries
            .remove_if(&id, |_, entry| entry.key == Some(key))
            .is_some();
        if removed {
            self.renderables.write().shift_remove(&id);
        }
        removed
    }

    /// Move the entry for `key` from `old` to `new`, keeping its render position.
    pub(crate) fn rekey(&self, old: NodeId, new: NodeId, key: NodeKey) {
        let Some((_, mut entry)) = self.entries.remove_if(&old, |_, entry| entry.key == Some(key))
        else {
            return;
        };
        entry.id = new;
        if let Some(previous) = self.entries.insert(new, entry)
            && let Some(previous_key) = previous.key
            && previous_key != key
        {
            warn!(id = %new, node = %key, previous = %previous_key, "duplicate node id; registry entry replaced");
        }
        let mut renderables = self.renderables.write();
        if let Some(index) = renderables.get_index_of(&old) {
            renderables.shift_remove_index(index);
            let (moved, _) = renderables.insert_full(new);
            renderables.move_index(moved, index);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<RegistryEntry> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// The key registered under `id`, if it still refers to a live node.
    pub fn lookup(&self, id: NodeId) -> Option<NodeKey> {
        self.entries.get(&id).and_then(|entry| entry.upgrade())
    }

    pub fn liveness(&self, id: NodeId) -> Option<Liveness> {
        self.entries.get(&id).map(|entry| entry.liveness)
    }

    /// Keys of every registered node whose component is a `T`.
    pub fn get_components<T: Component>(&self) -> Vec<NodeKey> {
        let kind = TypeId::of::<T>();
        self.entries
            .iter()
            .filter(|entry| entry.kind == Some(kind))
            .filter_map(|entry| entry.upgrade())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enabled, visible renderables in registration order.
    pub fn visible_renderables(&self) -> Vec<NodeKey> {
        let order: Vec<NodeId> = self.renderables.read().iter().copied().collect();
        order
            .into_iter()
            .filter_map(|id| {
                let entry = self.entries.get(&id)?;
                if entry.enabled && entry.visible {
                    entry.upgrade()
                } else {
                    None
                }
            })
            .collect()
    }

    pub(crate) fn set_enabled(&self, id: NodeId, enabled: bool) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.enabled = enabled;
            entry.liveness = Liveness::for_enabled(enabled);
        }
    }

    pub(crate) fn set_visible(&self, id: NodeId, visible: bool) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.visible = visible;
        }
    }

    /// Drop dead entries and reclaim collectable nodes. Simulation thread only.
    ///
    /// Entries whose node is gone or unloaded are removed; unloaded roots that
    /// are only weakly held are disposed as well. When the arena holds more
    /// than `memory_pressure_threshold` nodes, pools are emptied and every
    /// weakly held node is detached, deactivated and disposed.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut dead = Vec::new();
        let mut reclaim = Vec::new();
        for entry in self.entries.iter() {
            let Some(key) = entry.key else {
                continue;
            };
            if !key.is_valid() {
                dead.push((entry.id, key));
            } else if key.is_unloaded() {
                dead.push((entry.id, key));
                if entry.liveness == Liveness::Weak && key.parent().is_none() {
                    reclaim.push(key);
                }
            }
        }

        for (id, key) in dead {
            if self.remove_key(id, key) {
                stats.removed += 1;
            }
        }
        for key in reclaim {
            if key.is_valid() {
                key.dispose();
                stats.reclaimed += 1;
            }
        }

        if NodeKey::live_count() > self.config.memory_pressure_threshold {
            stats.memory_pressure = true;
            stats.pooled_dropped = self.clear_pools();
            let weak: Vec<(NodeId, NodeKey)> = self
                .entries
                .iter()
                .filter(|entry| entry.liveness == Liveness::Weak)
                .filter_map(|entry| Some((entry.id, entry.upgrade()?)))
                .collect();
            for (id, key) in weak {
                if !key.is_valid() {
                    continue;
                }
                if let Some(parent) = key.parent() {
                    parent.remove_child(key);
                }
                key.deactivate();
                key.dispose();
                self.remove_key(id, key);
                stats.reclaimed += 1;
            }
        }

        if stats != SweepStats::default() {
            debug!(?stats, entries = self.entries.len(), "registry sweep");
        }
        stats
    }

    /// Advance the sweep timer, sweeping once every `sweep_interval`.
    pub fn tick(&self, dt: Duration) -> Option<SweepStats> {
        {
            let mut since = self.since_sweep.lock();
            *since += dt;
            if *since < self.config.sweep_interval {
                return None;
            }
            *since = Duration::ZERO;
        }
        Some(self.sweep())
    }
}
