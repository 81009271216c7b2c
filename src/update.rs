//! Deferred updates.
//!
//! Setters that want their effect to land on a frame boundary queue a closure
//! on the node instead of mutating right away. The queue is drained by
//! [`NodeKey::apply_updates`], once per frame and before any `update` hook
//! runs, so every mutation of a frame is visible to all update logic.

use std::any::Any;

use crate::{
    error::UpdateError,
    node::{Component, NodeKey},
};

pub(crate) type ActionFn = Box<dyn FnOnce() -> Result<(), UpdateError>>;
pub(crate) type ComponentFn = Box<dyn FnOnce(&mut dyn Component) -> Result<(), UpdateError>>;

#[derive(educe::Educe)]
#[educe(Debug)]
pub(crate) enum DeferredUpdate {
    /// Runs with no borrows held.
    Action(#[educe(Debug(ignore))] ActionFn),
    /// Runs with the node's component mutably borrowed.
    Component(#[educe(Debug(ignore))] ComponentFn),
}

impl NodeKey {
    /// Queue `action` to run at the next [`apply_updates`](NodeKey::apply_updates).
    ///
    /// An `Err` (or a panic) is logged by the drain and does not stop the
    /// actions queued after it.
    pub fn defer(&self, action: impl FnOnce() -> Result<(), UpdateError> + 'static) {
        self.push_update(DeferredUpdate::Action(Box::new(action)));
    }

    /// Queue a mutation of this node's component, which must be a `T`.
    pub fn defer_with<T: Component>(
        &self,
        action: impl FnOnce(&mut T) -> Result<(), UpdateError> + 'static,
    ) {
        self.defer_component(move |component| {
            match (component as &mut dyn Any).downcast_mut::<T>() {
                Some(component) => action(component),
                None => Err(UpdateError::TargetType {
                    expected: std::any::type_name::<T>(),
                }),
            }
        });
    }

    pub(crate) fn defer_component(
        &self,
        action: impl FnOnce(&mut dyn Component) -> Result<(), UpdateError> + 'static,
    ) {
        self.push_update(DeferredUpdate::Component(Box::new(action)));
    }

    fn push_update(&self, update: DeferredUpdate) {
        if self
            .write_state(|s| s.pending_updates.push_back(update))
            .is_none()
        {
            tracing::warn!(node = %self, "deferred update queued on a disposed node");
        }
    }

    /// Number of deferred updates waiting for the next drain.
    pub fn pending_update_count(&self) -> usize {
        self.read_state(|s| s.pending_updates.len()).unwrap_or(0)
    }
}
