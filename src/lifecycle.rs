//! The lifecycle state machine.
//!
//! Every phase is a method on [`NodeKey`] and propagates through the subtree:
//! `configure`, `activate` and `update` go parent before child, `deactivate`
//! clears the node's active flag before recursing but runs the node's own
//! hook last, and `dispose` tears children down before their parent.
//!
//! All of it is synchronous and runs on the thread that owns the arena.

use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    time::Duration,
};

use tracing::{debug, error, trace, warn};

use crate::{
    error::{AccessError, UpdateError},
    event::LifecycleEvent,
    id::NodeId,
    node::{
        NodeKey,
        state::{NodeFlags, NodeState},
    },
    template::Template,
    update::DeferredUpdate,
    validation::{self, ValidateCx, ValidationError, ValidationState},
};

/// Passed to [`Component::update`](crate::Component::update).
#[derive(Debug, Clone, Copy)]
pub struct UpdateCx {
    key: NodeKey,
    dt: Duration,
}

impl UpdateCx {
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Time since the previous frame.
    pub fn dt(&self) -> Duration {
        self.dt
    }
}

/// Drain deferred updates across the tree rooted at `root`, then update it.
pub fn step_frame(root: NodeKey, dt: Duration) {
    root.apply_updates_tree();
    root.update(dt);
}

fn refuse(key: NodeKey, phase: &'static str, err: AccessError) {
    match err {
        AccessError::Reentrant(_) => {
            error!(node = %key, phase, "re-entrant lifecycle call on a node whose component is in use; skipped")
        }
        AccessError::Stale(_) => debug!(node = %key, phase, "lifecycle call on a disposed node"),
        AccessError::Unmounted(_) => {
            warn!(node = %key, phase, "lifecycle call on a node with no component")
        }
    }
}

impl NodeKey {
    fn has_flag(&self, flag: NodeFlags) -> bool {
        self.read_state(|s| s.flags.contains(flag)).unwrap_or(false)
    }

    fn set_flag(&self, flag: NodeFlags, value: bool) {
        self.write_state(|s| s.flags.set(flag, value));
    }

    /// Apply `template` to this node and build the children it declares.
    ///
    /// Name, identity, enabled state and binding definitions come from the
    /// template's [`TemplateBase`](crate::TemplateBase); definitions without a
    /// target setter are dropped here. The component's own hook runs before
    /// any child is built. Children are appended, so configuring twice builds
    /// the declared children twice; [`reset`](NodeKey::reset) first to rebuild.
    ///
    /// Identity and enabled state are applied like [`set_enabled`](NodeKey::set_enabled),
    /// so a registered node's entry follows them.
    pub fn configure(&self, template: &dyn Template) {
        let base = template.base();
        let applied = self.write_state(|s| {
            if !base.name.is_empty() {
                s.name = base.name.clone();
            }
            s.flags.insert(NodeFlags::CONFIGURED);
            s.validation.invalidate();
            let before = s.bindings.len();
            s.bindings.extend(
                base.bindings
                    .iter()
                    .filter(|definition| definition.is_valid())
                    .map(|definition| crate::binding::PropertyBinding::new(definition.clone())),
            );
            let dropped = base.bindings.len() - (s.bindings.len() - before);
            if dropped > 0 {
                debug!(node = %self, dropped, "binding definitions without a source or target setter dropped");
            }
        });
        if applied.is_none() {
            warn!(node = %self, "configure on a disposed node");
            return;
        }
        if let Some(id) = base.id {
            self.set_id(id);
        }

        self.emit(LifecycleEvent::BeforeConfigure);
        self.set_enabled(base.enabled);
        let scope = self.scope();
        if let Err(err) = self.with_dyn_mut(|c| scope.enter(|| c.configure(template))) {
            refuse(*self, "configure", err);
            return;
        }

        if let Some(subcomponents) = template.subcomponents() {
            for sub in subcomponents {
                let child = self.add_child_component(sub.instantiate());
                child.configure(sub.as_ref());
            }
        }
        debug!(node = %self, name = %self.name(), "configured");
        self.emit(LifecycleEvent::AfterConfigure);
    }

    /// Run the component's validation hook, or return the cached verdict.
    ///
    /// With `force` the hook always runs. A failed validation deactivates the
    /// node. Children are not validated by their parent.
    pub fn validate(&self, force: bool) -> bool {
        let Some(cached) = self.read_state(|s| s.validation.verdict()) else {
            debug!(node = %self, "validate on a disposed node");
            return false;
        };
        if let (Some(valid), false) = (cached, force) {
            self.read_state(|s| {
                for err in &s.validation_errors {
                    debug!(node = %self, severity = ?err.severity, message = %err.message, "cached validation result");
                }
            });
            return valid;
        }

        self.emit(LifecycleEvent::Validating);
        let errors = match self.with_dyn(|c| {
            let mut cx = ValidateCx::new(*self);
            c.validate(&mut cx);
            cx.into_errors()
        }) {
            Ok(errors) => errors,
            Err(err) => {
                refuse(*self, "validate", err);
                return cached.unwrap_or(false);
            }
        };

        let valid = validation::passes(&errors);
        for err in &errors {
            warn!(node = %self, severity = ?err.severity, message = %err.message, "validation");
        }
        let failed: Option<Rc<[ValidationError]>> = (!valid).then(|| errors.as_slice().into());
        self.write_state(|s| {
            s.validation = ValidationState::from(valid);
            s.validation_errors = errors;
        });

        match failed {
            Some(errors) => {
                self.emit(LifecycleEvent::ValidationFailed(errors));
                self.deactivate();
            }
            None => self.emit(LifecycleEvent::Validated),
        }
        valid
    }

    /// Forget the cached validation verdict so the next `validate` runs the hook.
    pub fn invalidate_validation(&self) {
        self.write_state(|s| s.validation.invalidate());
    }

    /// Validate, then activate this node, its bindings, and its children.
    ///
    /// An invalid node is skipped together with its subtree; siblings and
    /// ancestors are unaffected.
    pub fn activate(&self) {
        if !self.is_valid() {
            debug!(node = %self, "activate on a disposed node");
            return;
        }
        if self.has_flag(NodeFlags::ACTIVE) {
            trace!(node = %self, "already active");
            return;
        }
        if !self.validate(false) {
            debug!(node = %self, name = %self.name(), "validation failed; not activating");
            return;
        }

        self.emit(LifecycleEvent::Activating);
        self.set_flag(NodeFlags::UNLOADED, false);
        let scope = self.scope();
        if let Err(err) = self.with_dyn_mut(|c| scope.enter(|| c.activate())) {
            refuse(*self, "activate", err);
            return;
        }
        self.activate_bindings();
        for child in self.children() {
            child.activate();
        }
        self.set_flag(NodeFlags::ACTIVE, true);
        debug!(node = %self, name = %self.name(), "activated");
        self.emit(LifecycleEvent::Activated);
    }

    /// Run one frame of `update` on this node and then on its children.
    pub fn update(&self, dt: Duration) {
        if !self.is_active() {
            trace!(node = %self, "update skipped; node is not active");
            return;
        }
        self.set_flag(NodeFlags::UPDATING, true);
        self.emit(LifecycleEvent::Updating);
        let mut cx = UpdateCx { key: *self, dt };
        if let Err(err) = self.with_dyn_mut(|c| c.update(&mut cx)) {
            refuse(*self, "update", err);
        }
        for child in self.children() {
            child.update(dt);
        }
        self.emit(LifecycleEvent::Updated);
        self.set_flag(NodeFlags::UPDATING, false);
    }

    /// Drain this node's deferred updates in FIFO order.
    ///
    /// Updates queued while draining wait for the next call. If anything ran,
    /// the node is revalidated. Returns the number of updates that ran.
    pub fn apply_updates(&self) -> usize {
        let queue = self
            .write_state(|s| mem::take(&mut s.pending_updates))
            .unwrap_or_default();
        if queue.is_empty() {
            return 0;
        }
        let count = queue.len();
        for update in queue {
            let result = panic::catch_unwind(AssertUnwindSafe(|| match update {
                DeferredUpdate::Action(action) => action(),
                DeferredUpdate::Component(action) => self
                    .with_dyn_mut(action)
                    .unwrap_or_else(|err| Err(err.into())),
            }))
            .unwrap_or_else(|payload| Err(UpdateError::Panicked(panic_message(&*payload))));
            if let Err(err) = result {
                warn!(node = %self, error = %err, "deferred update failed");
            }
        }
        self.validate(true);
        count
    }

    /// [`apply_updates`](NodeKey::apply_updates) on every node of this subtree,
    /// active or not, parents first.
    pub fn apply_updates_tree(&self) -> usize {
        self.descendants()
            .into_iter()
            .map(|key| key.apply_updates())
            .sum()
    }

    /// Deactivate this node and its subtree.
    ///
    /// The active flag is cleared before children are deactivated, and the
    /// node's own hook runs after them. A no-op once the node is unloaded.
    pub fn deactivate(&self) {
        if !self.is_valid() || self.has_flag(NodeFlags::UNLOADED) {
            return;
        }
        if self.has_flag(NodeFlags::DEACTIVATING) {
            trace!(node = %self, "deactivate already in progress");
            return;
        }
        self.set_flag(NodeFlags::DEACTIVATING, true);
        self.emit(LifecycleEvent::Deactivating);
        self.set_flag(NodeFlags::ACTIVE, false);
        for child in self.children() {
            child.deactivate();
        }
        let scope = self.scope();
        if let Err(err) = self.with_dyn_mut(|c| scope.enter(|| c.deactivate())) {
            refuse(*self, "deactivate", err);
        }
        self.deactivate_bindings();
        self.emit(LifecycleEvent::Deactivated);
        self.write_state(|s| {
            s.flags.remove(NodeFlags::DEACTIVATING);
            s.flags.insert(NodeFlags::UNLOADED);
        });
        debug!(node = %self, name = %self.name(), "deactivated");
    }

    /// Dispose the subtree, leaves first, and free it from the arena.
    ///
    /// Bindings are dropped, the node's [`Scope`](arbor_reactive::Scope) is
    /// disposed, its registry entry removed, and the key goes stale. Disposing
    /// a stale key is a logged no-op.
    pub fn dispose(&self) {
        if !self.is_valid() {
            debug!(node = %self, "dispose of an already disposed node");
            return;
        }
        if let Some(component) = self.component()
            && component.try_borrow_mut().is_err()
        {
            refuse(*self, "dispose", AccessError::Reentrant(*self));
            return;
        }

        for child in self.children() {
            child.dispose();
        }
        if let Err(err) = self.with_dyn_mut(|c| c.dispose()) {
            refuse(*self, "dispose", err);
        }

        let Some((id, bindings, scope, registry)) = self.write_state(|s| {
            s.listeners.clear();
            s.pending_updates.clear();
            (s.id, mem::take(&mut s.bindings), s.scope, s.registry.take())
        }) else {
            return;
        };
        drop(bindings);
        scope.dispose();
        if let Some(registry) = registry.and_then(|r| r.upgrade()) {
            registry.remove_key(id, *self);
        }

        let parent = self.parent();
        let removed = self.remove_from_storage();
        debug!(node = %self, %id, "disposed");
        drop(removed);
        if let Some(parent) = parent {
            parent.emit(LifecycleEvent::TreeChanged {
                added: Default::default(),
                removed: smallvec::smallvec![*self],
            });
        }
    }

    /// Return the node to a freshly constructed state so it can be reused.
    ///
    /// Deactivates the node, disposes its children, drops its bindings,
    /// listeners and deferred updates, clears its name and flags, and runs the
    /// component's `reset` hook. The node keeps its key and parent.
    pub fn reset(&self) {
        if !self.is_valid() {
            return;
        }
        self.deactivate();
        for child in self.children() {
            child.dispose();
        }
        let bindings = self.write_state(|s| {
            s.listeners.clear();
            s.pending_updates.clear();
            s.validation = ValidationState::Unknown;
            s.validation_errors.clear();
            s.name.clear();
            s.flags = NodeFlags::default();
            mem::take(&mut s.bindings)
        });
        drop(bindings);
        if let Err(err) = self.with_dyn_mut(|c| c.reset()) {
            refuse(*self, "reset", err);
        }
    }

    /// Active and enabled.
    pub fn is_active(&self) -> bool {
        self.read_state(NodeState::is_active).unwrap_or(false)
    }

    pub fn is_enabled(&self) -> bool {
        self.has_flag(NodeFlags::ENABLED)
    }

    /// Enable or disable the node.
    ///
    /// A disabled node reads as inactive and its registry entry turns weak,
    /// which lets [`Registry::sweep`](crate::Registry::sweep) reclaim it.
    pub fn set_enabled(&self, enabled: bool) {
        let Some((changed, id, registry)) = self.write_state(|s| {
            let changed = s.flags.contains(NodeFlags::ENABLED) != enabled;
            s.flags.set(NodeFlags::ENABLED, enabled);
            if changed {
                s.validation.invalidate();
            }
            (changed, s.id, s.registry.clone())
        }) else {
            return;
        };
        if !changed {
            return;
        }
        if let Some(registry) = registry.and_then(|r| r.upgrade()) {
            registry.set_enabled(id, enabled);
        }
        self.emit(LifecycleEvent::EnabledChanged(enabled));
    }

    /// Give the node a new identity, moving its registry entry along with it.
    pub(crate) fn set_id(&self, id: NodeId) {
        let Some((old, registry)) = self.write_state(|s| {
            let old = mem::replace(&mut s.id, id);
            if old != id {
                s.validation.invalidate();
            }
            (old, s.registry.clone())
        }) else {
            return;
        };
        if old != id
            && let Some(registry) = registry.and_then(|r| r.upgrade())
        {
            registry.rekey(old, id, *self);
        }
    }

    pub fn is_visible(&self) -> bool {
        self.has_flag(NodeFlags::VISIBLE)
    }

    pub fn set_visible(&self, visible: bool) {
        let Some((changed, id, registry)) = self.write_state(|s| {
            let changed = s.flags.contains(NodeFlags::VISIBLE) != visible;
            s.flags.set(NodeFlags::VISIBLE, visible);
            if changed {
                s.validation.invalidate();
            }
            (changed, s.id, s.registry.clone())
        }) else {
            return;
        };
        if changed && let Some(registry) = registry.and_then(|r| r.upgrade()) {
            registry.set_visible(id, visible);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.has_flag(NodeFlags::CONFIGURED)
    }

    pub fn is_unloaded(&self) -> bool {
        self.has_flag(NodeFlags::UNLOADED)
    }

    /// True only while this node's own `update` is running.
    pub fn is_updating(&self) -> bool {
        self.has_flag(NodeFlags::UPDATING)
    }

    pub fn validation_state(&self) -> ValidationState {
        self.read_state(|s| s.validation).unwrap_or_default()
    }

    /// Problems reported by the most recent validation pass.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.read_state(|s| s.validation_errors.clone())
            .unwrap_or_default()
    }

    /// Number of bindings that survived configuration.
    pub fn binding_count(&self) -> usize {
        self.read_state(|s| s.bindings.len()).unwrap_or(0)
    }

    /// Number of bindings currently subscribed to a source.
    pub fn active_binding_count(&self) -> usize {
        self.read_state(|s| s.bindings.iter().filter(|b| b.is_active()).count())
            .unwrap_or(0)
    }

    // bindings are taken out of the state while they run: their first sync
    // calls back into the node
    fn activate_bindings(&self) {
        let Some(mut bindings) = self.write_state(|s| mem::take(&mut s.bindings)) else {
            return;
        };
        for binding in &mut bindings {
            if let Err(err) = binding.activate(*self) {
                warn!(node = %self, error = %err, "binding left inactive");
            }
        }
        self.restore_bindings(bindings);
    }

    fn deactivate_bindings(&self) {
        let Some(mut bindings) = self.write_state(|s| mem::take(&mut s.bindings)) else {
            return;
        };
        for binding in &mut bindings {
            binding.deactivate();
        }
        self.restore_bindings(bindings);
    }

    fn restore_bindings(&self, mut bindings: Vec<crate::binding::PropertyBinding>) {
        self.write_state(|s| {
            bindings.append(&mut s.bindings);
            s.bindings = bindings;
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
