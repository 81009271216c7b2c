//! Lifecycle notifications.
//!
//! Each node exposes fire-and-forget channels for every lifecycle transition
//! and for structural changes to its children. Observers such as renderers or
//! editors register with [`NodeKey::on_event`]; callbacks run synchronously on
//! the calling thread, in registration order, with no internal borrows held.

use std::{rc::Rc, sync::atomic::AtomicU64};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{node::NodeKey, validation::ValidationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeConfigure,
    AfterConfigure,
    Validating,
    Validated,
    ValidationFailed,
    Activating,
    Activated,
    Updating,
    Updated,
    Deactivating,
    Deactivated,
    TreeChanged,
    EnabledChanged,
}

#[derive(Clone, Debug)]
pub enum LifecycleEvent {
    BeforeConfigure,
    AfterConfigure,
    Validating,
    Validated,
    ValidationFailed(Rc<[ValidationError]>),
    Activating,
    Activated,
    Updating,
    Updated,
    Deactivating,
    Deactivated,
    TreeChanged {
        added: SmallVec<[NodeKey; 1]>,
        removed: SmallVec<[NodeKey; 1]>,
    },
    EnabledChanged(bool),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LifecycleEvent::BeforeConfigure => EventKind::BeforeConfigure,
            LifecycleEvent::AfterConfigure => EventKind::AfterConfigure,
            LifecycleEvent::Validating => EventKind::Validating,
            LifecycleEvent::Validated => EventKind::Validated,
            LifecycleEvent::ValidationFailed(_) => EventKind::ValidationFailed,
            LifecycleEvent::Activating => EventKind::Activating,
            LifecycleEvent::Activated => EventKind::Activated,
            LifecycleEvent::Updating => EventKind::Updating,
            LifecycleEvent::Updated => EventKind::Updated,
            LifecycleEvent::Deactivating => EventKind::Deactivating,
            LifecycleEvent::Deactivated => EventKind::Deactivated,
            LifecycleEvent::TreeChanged { .. } => EventKind::TreeChanged,
            LifecycleEvent::EnabledChanged(_) => EventKind::EnabledChanged,
        }
    }
}

/// Handle returned by [`NodeKey::on_event`], used to remove the listener again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        ListenerId(COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

pub type EventCallback = dyn Fn(NodeKey, &LifecycleEvent);

type ListenerVec = SmallVec<[(ListenerId, Rc<EventCallback>); 1]>;

#[derive(Default)]
pub(crate) struct Listeners {
    by_kind: FxHashMap<EventKind, ListenerVec>,
}

impl Listeners {
    pub(crate) fn clear(&mut self) {
        self.by_kind.clear();
    }
}

impl NodeKey {
    /// Call `callback` every time this node emits an event of `kind`.
    pub fn on_event(
        &self,
        kind: EventKind,
        callback: impl Fn(NodeKey, &LifecycleEvent) + 'static,
    ) -> ListenerId {
        let id = ListenerId::next();
        self.write_state(|s| {
            s.listeners
                .by_kind
                .entry(kind)
                .or_default()
                .push((id, Rc::new(callback)));
        });
        id
    }

    /// Remove a listener added with [`NodeKey::on_event`]. Returns whether it was found.
    pub fn remove_listener(&self, listener: ListenerId) -> bool {
        self.write_state(|s| {
            let mut found = false;
            for listeners in s.listeners.by_kind.values_mut() {
                let before = listeners.len();
                listeners.retain(|(id, _)| *id != listener);
                found |= listeners.len() != before;
            }
            found
        })
        .unwrap_or(false)
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        let listeners: ListenerVec = self
            .read_state(|s| s.listeners.by_kind.get(&event.kind()).cloned())
            .flatten()
            .unwrap_or_default();
        for (_, callback) in listeners {
            callback(*self, &event);
        }
    }
}
