//! Per-kind pools of reset nodes, for kinds that are created and dropped often.
//!
//! Pools hold arena keys, so these methods must run on the simulation thread.

use std::any::TypeId;

use tracing::{debug, trace};

use super::Registry;
use crate::node::{Component, NodeKey};

impl Registry {
    /// Detach, reset and unregister `key`, then keep it for reuse.
    ///
    /// If the pool for its kind is full the node is disposed instead.
    /// Returns whether the node was pooled.
    pub fn release_to_pool(&self, key: NodeKey) -> bool {
        let Some(kind) = key.kind() else {
            debug!(node = %key, "cannot pool a stale or unmounted node");
            return false;
        };
        if let Some(parent) = key.parent() {
            parent.remove_child(key);
        }
        key.reset();
        if let Some(id) = key.id() {
            self.remove_key(id, key);
        }
        key.write_state(|s| s.registry = None);

        let pooled = {
            let mut pools = self.pools.lock();
            let pool = pools.entry(kind).or_default();
            if pool.len() < self.config.pool_capacity {
                pool.push(key);
                true
            } else {
                false
            }
        };
        if !pooled {
            trace!(node = %key, kind = %key.kind_name(), "pool full; disposing");
            key.dispose();
        }
        pooled
    }

    /// A reset node of kind `T`, if one is pooled.
    pub fn take_from_pool<T: Component>(&self) -> Option<NodeKey> {
        let mut pools = self.pools.lock();
        let pool = pools.get_mut(&TypeId::of::<T>())?;
        while let Some(key) = pool.pop() {
            if key.is_valid() {
                return Some(key);
            }
        }
        None
    }

    pub fn pool_len<T: Component>(&self) -> usize {
        self.pools
            .lock()
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    /// Dispose every pooled node. Returns how many there were.
    pub fn clear_pools(&self) -> usize {
        let pooled: Vec<NodeKey> = self
            .pools
            .lock()
            .drain()
            .flat_map(|(_, pool)| pool)
            .collect();
        let count = pooled.len();
        for key in pooled {
            key.dispose();
        }
        count
    }
}
