//! # `NodeKey`s
//!
//! [`NodeKey`]s are generation-checked handles into the node arena. They are
//! `Copy`, cheap to compare, and go stale (rather than dangling) once the node
//! they refer to is disposed. All tree navigation hangs off them.

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

use arbor_reactive::{Property, Scope};
use slotmap::{Key, new_key_type};
use smallvec::smallvec;
use tracing::{debug, warn};

use super::{
    AnyComponent, Component,
    state::NodeState,
    storage::{NODE_STORAGE, RemovedNode},
};
use crate::{error::AccessError, event::LifecycleEvent, id::NodeId};

new_key_type! {
    /// A small, generation-checked handle to a node in the arena.
    ///
    /// Parent links are stored as `NodeKey`s too, so they never own the node
    /// they point at: the arena does.
    pub struct NodeKey;
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.data())
    }
}

/// Place `component` in the arena as a detached root and return its key.
///
/// The component must have been built with a key from [`NodeKey::new`]; mounting
/// records its concrete kind, which typed lookups match against.
pub fn mount(component: AnyComponent) -> NodeKey {
    let key = component.key();
    let Some(state) = key.state() else {
        warn!(node = %key, "mounting a component whose key is stale");
        return key;
    };
    {
        let component: &dyn Component = component.as_ref();
        let mut state = state.borrow_mut();
        state.kind = Some((component as &dyn Any).type_id());
        state.kind_name = component.kind_name().into();
    }
    NODE_STORAGE.with_borrow_mut(|s| {
        s.components.insert(key, Rc::new(RefCell::new(component)));
    });
    key
}

impl NodeKey {
    /// Allocate a new key with fresh lifecycle state.
    pub fn new() -> NodeKey {
        NODE_STORAGE.with_borrow_mut(|s| {
            let key = s.keys.insert(());
            s.states.insert(key, Rc::new(RefCell::new(NodeState::new())));
            s.children.insert(key, Vec::new());
            s.parent.insert(key, None);
            key
        })
    }

    /// Number of nodes currently alive in this thread's arena.
    pub fn live_count() -> usize {
        NODE_STORAGE.with_borrow(|s| s.keys.len())
    }

    /// Whether the node this key refers to still exists.
    pub fn is_valid(&self) -> bool {
        NODE_STORAGE.with_borrow(|s| s.keys.contains_key(*self))
    }

    /// Whether a component has been mounted for this key.
    pub fn is_mounted(&self) -> bool {
        NODE_STORAGE.with_borrow(|s| s.components.contains_key(*self))
    }

    pub(crate) fn state(&self) -> Option<Rc<RefCell<NodeState>>> {
        NODE_STORAGE.with_borrow(|s| s.states.get(*self).cloned())
    }

    pub(crate) fn component(&self) -> Option<Rc<RefCell<AnyComponent>>> {
        NODE_STORAGE.with_borrow(|s| s.components.get(*self).cloned())
    }

    pub(crate) fn read_state<R>(&self, f: impl FnOnce(&NodeState) -> R) -> Option<R> {
        let state = self.state()?;
        let state = state.borrow();
        Some(f(&state))
    }

    pub(crate) fn write_state<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> Option<R> {
        let state = self.state()?;
        let mut state = state.borrow_mut();
        Some(f(&mut state))
    }

    pub(crate) fn with_dyn<R>(
        &self,
        f: impl FnOnce(&dyn Component) -> R,
    ) -> Result<R, AccessError> {
        let component = self.component().ok_or_else(|| self.missing())?;
        let component = component
            .try_borrow()
            .map_err(|_| AccessError::Reentrant(*self))?;
        Ok(f(component.as_ref()))
    }

    pub(crate) fn with_dyn_mut<R>(
        &self,
        f: impl FnOnce(&mut dyn Component) -> R,
    ) -> Result<R, AccessError> {
        let component = self.component().ok_or_else(|| self.missing())?;
        let mut component = component
            .try_borrow_mut()
            .map_err(|_| AccessError::Reentrant(*self))?;
        Ok(f(component.as_mut()))
    }

    fn missing(&self) -> AccessError {
        if self.is_valid() {
            AccessError::Unmounted(*self)
        } else {
            AccessError::Stale(*self)
        }
    }

    /// Run `f` with the component if it is a `T`.
    ///
    /// Returns `None` for stale keys, other component types, or if the component
    /// is already mutably borrowed further up the stack.
    pub fn with_component<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.with_dyn(|c| (c as &dyn Any).downcast_ref::<T>().map(f))
            .ok()
            .flatten()
    }

    /// Run `f` with mutable access to the component if it is a `T`.
    pub fn with_component_mut<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.with_dyn_mut(|c| (c as &mut dyn Any).downcast_mut::<T>().map(f))
            .ok()
            .flatten()
    }

    /// Whether the mounted component is a `T`. Does not borrow the component.
    pub fn is<T: Component>(&self) -> bool {
        self.read_state(|s| s.kind == Some(std::any::TypeId::of::<T>()))
            .unwrap_or(false)
    }

    pub(crate) fn kind(&self) -> Option<std::any::TypeId> {
        self.read_state(|s| s.kind).flatten()
    }

    /// The concrete type name of the mounted component.
    pub fn kind_name(&self) -> String {
        self.read_state(|s| s.kind_name.to_string())
            .unwrap_or_default()
    }

    /// The reactive scope owning the node's properties and notifiers.
    ///
    /// Hooks run inside it, and it is disposed with the node.
    pub fn scope(&self) -> Scope {
        self.read_state(|s| s.scope).unwrap_or_else(Scope::current)
    }

    /// Create a [`Property`] owned by this node's scope.
    pub fn property<T: 'static>(&self, value: T) -> Property<T> {
        self.scope().create_property(value)
    }

    /// The node's identity, or `None` for a stale key.
    pub fn id(&self) -> Option<NodeId> {
        self.read_state(|s| s.id)
    }

    pub fn name(&self) -> String {
        self.read_state(|s| s.name.clone()).unwrap_or_default()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.write_state(|s| {
            s.name = name;
            s.validation.invalidate();
        });
    }

    /// The parent node, or `None` for roots.
    pub fn parent(&self) -> Option<NodeKey> {
        NODE_STORAGE.with_borrow(|s| s.parent.get(*self).copied().flatten())
    }

    /// Direct children in insertion order.
    pub fn children(&self) -> Vec<NodeKey> {
        NODE_STORAGE.with_borrow(|s| s.children.get(*self).cloned().unwrap_or_default())
    }

    pub fn has_child(&self, child: NodeKey) -> bool {
        NODE_STORAGE.with_borrow(|s| {
            s.children
                .get(*self)
                .is_some_and(|children| children.contains(&child))
        })
    }

    /// The root of the tree this node belongs to (itself if detached).
    pub fn root(&self) -> NodeKey {
        NODE_STORAGE.with_borrow(|s| s.root_of(*self))
    }

    /// Every node of this subtree in depth-first pre-order, starting with this node.
    pub fn descendants(&self) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![*self];
        while let Some(key) = stack.pop() {
            if !key.is_valid() {
                continue;
            }
            out.push(key);
            stack.extend(key.children().into_iter().rev());
        }
        out
    }

    /// Attach `child` as the last child of this node.
    ///
    /// A no-op (returning `false`) if `child` is already a child of this node,
    /// is this node, is an ancestor of this node, or is stale. A child attached
    /// elsewhere is moved. An unnamed child is named after its component kind.
    pub fn add_child(&self, child: NodeKey) -> bool {
        if !self.is_valid() || !child.is_valid() {
            warn!(parent = %self, child = %child, "add_child with a stale key");
            return false;
        }
        if self.has_child(child) {
            debug!(parent = %self, child = %child, "child already attached");
            return false;
        }
        if child == *self || self.ancestors().contains(&child) {
            warn!(parent = %self, child = %child, "refusing to create a cycle");
            return false;
        }
        if let Some(previous) = child.parent() {
            previous.remove_child(child);
        }
        child.write_state(|s| {
            if s.name.is_empty() {
                s.name = short_kind_name(&s.kind_name).to_string();
            }
        });
        NODE_STORAGE.with_borrow_mut(|s| {
            if let Some(children) = s.children.get_mut(*self) {
                children.push(child);
            }
            s.parent.insert(child, Some(*self));
        });
        self.invalidate_validation();
        self.emit(LifecycleEvent::TreeChanged {
            added: smallvec![child],
            removed: smallvec![],
        });
        true
    }

    /// Mount `component` and attach it as the last child of this node.
    pub fn add_child_component(&self, component: AnyComponent) -> NodeKey {
        let child = mount(component);
        self.add_child(child);
        child
    }

    /// Detach `child` from this node.
    ///
    /// The child keeps its state: it is neither deactivated nor disposed.
    /// Returns `false` (a no-op) if `child` is not a child of this node.
    pub fn remove_child(&self, child: NodeKey) -> bool {
        let removed = NODE_STORAGE.with_borrow_mut(|s| {
            let Some(children) = s.children.get_mut(*self) else {
                return false;
            };
            let Some(index) = children.iter().position(|c| *c == child) else {
                return false;
            };
            children.remove(index);
            s.parent.insert(child, None);
            true
        });
        if !removed {
            debug!(parent = %self, child = %child, "remove_child of a node that is not a child");
            return false;
        }
        self.invalidate_validation();
        self.emit(LifecycleEvent::TreeChanged {
            added: smallvec![],
            removed: smallvec![child],
        });
        true
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(key) = current {
            out.push(key);
            current = key.parent();
        }
        out
    }

    /// Children whose component is a `T`.
    pub fn children_of<T: Component>(&self) -> Vec<NodeKey> {
        self.children().into_iter().filter(|c| c.is::<T>()).collect()
    }

    /// Children whose component is a `T` accepted by `filter`.
    pub fn children_where<T: Component>(&self, filter: impl Fn(&T) -> bool) -> Vec<NodeKey> {
        self.children()
            .into_iter()
            .filter(|c| c.with_component(&filter).unwrap_or(false))
            .collect()
    }

    /// The other children of this node's parent. Never includes this node.
    pub fn siblings(&self) -> Vec<NodeKey> {
        let Some(parent) = self.parent() else {
            return Vec::new();
        };
        parent
            .children()
            .into_iter()
            .filter(|c| c != self)
            .collect()
    }

    pub fn siblings_of<T: Component>(&self) -> Vec<NodeKey> {
        self.siblings().into_iter().filter(|c| c.is::<T>()).collect()
    }

    pub fn siblings_where<T: Component>(&self, filter: impl Fn(&T) -> bool) -> Vec<NodeKey> {
        self.siblings()
            .into_iter()
            .filter(|c| c.with_component(&filter).unwrap_or(false))
            .collect()
    }

    /// The nearest ancestor whose component is a `T`.
    pub fn find_parent<T: Component>(&self) -> Option<NodeKey> {
        self.ancestors().into_iter().find(|a| a.is::<T>())
    }

    /// The nearest ancestor whose component is a `T` accepted by `filter`.
    pub fn find_parent_where<T: Component>(&self, filter: impl Fn(&T) -> bool) -> Option<NodeKey> {
        self.ancestors()
            .into_iter()
            .find(|a| a.with_component(&filter).unwrap_or(false))
    }

    /// Depth-first search of the whole tree (from the root) for a node called `name`.
    pub fn find_named(&self, name: &str) -> Option<NodeKey> {
        self.root()
            .descendants()
            .into_iter()
            .find(|key| key.read_state(|s| s.name == name).unwrap_or(false))
    }

    /// Free this node's slot and hand back what it owned.
    pub(crate) fn remove_from_storage(&self) -> RemovedNode {
        NODE_STORAGE.with_borrow_mut(|s| s.remove(*self))
    }
}

/// `my_crate::widgets::Label<T>` becomes `Label`.
pub(crate) fn short_kind_name(name: &str) -> &str {
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}
