use std::{cell::RefCell, rc::Rc};

use slotmap::{SecondaryMap, SlotMap};

use super::{AnyComponent, NodeKey, state::NodeState};

thread_local! {
    pub(crate) static NODE_STORAGE: RefCell<NodeStorage> = Default::default();
}

/// The arena every node lives in.
///
/// The primary `SlotMap` hands out generation-checked [`NodeKey`]s; everything
/// else is a `SecondaryMap` keyed by them, so a stale key simply misses instead
/// of aliasing whatever node reused its slot.
#[derive(Default)]
pub(crate) struct NodeStorage {
    pub(crate) keys: SlotMap<NodeKey, ()>,
    pub(crate) components: SecondaryMap<NodeKey, Rc<RefCell<AnyComponent>>>,
    pub(crate) states: SecondaryMap<NodeKey, Rc<RefCell<NodeState>>>,
    pub(crate) children: SecondaryMap<NodeKey, Vec<NodeKey>>,
    // the parent of a node; `None` for roots
    pub(crate) parent: SecondaryMap<NodeKey, Option<NodeKey>>,
}

/// Everything a removed node owned, dropped only after the storage borrow ends.
pub(crate) struct RemovedNode {
    pub(crate) _component: Option<Rc<RefCell<AnyComponent>>>,
    pub(crate) _state: Option<Rc<RefCell<NodeState>>>,
}

impl NodeStorage {
    pub(crate) fn root_of(&self, key: NodeKey) -> NodeKey {
        let mut current = key;
        while let Some(Some(parent)) = self.parent.get(current) {
            current = *parent;
        }
        current
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> RemovedNode {
        if let Some(Some(parent)) = self.parent.get(key)
            && let Some(children) = self.children.get_mut(*parent)
        {
            children.retain(|c| *c != key);
        }
        // SecondaryMaps don't clean up when the primary key goes away,
        // so every entry is removed before the slot is released
        self.children.remove(key);
        self.parent.remove(key);
        let removed = RemovedNode {
            _component: self.components.remove(key),
            _state: self.states.remove(key),
        };
        self.keys.remove(key);
        removed
    }
}
