use std::{fmt, rc::Rc};

use smallvec::SmallVec;

use crate::{
    id::Id,
    runtime::{Callback, NotifierState, RUNTIME},
};

/// A multi-subscriber change channel.
///
/// Subscribers are plain closures invoked synchronously, on the calling thread,
/// in subscription order, every time [`Notifier::notify`] is called. `Notifier`
/// is `Copy`; the subscriber list lives in the thread local runtime.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Notifier {
    pub(crate) id: Id,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("id", &self.id).finish()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Create a notifier owned by the current [`Scope`](crate::Scope).
    pub fn new() -> Self {
        let id = Id::next();
        RUNTIME.with(|runtime| {
            runtime
                .notifiers
                .borrow_mut()
                .insert(id, NotifierState::default())
        });
        id.set_scope();
        Notifier { id }
    }

    /// Register `f` to run on every notification.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped. Subscribing to a
    /// disposed notifier returns an inert subscription.
    pub fn subscribe(&self, f: impl Fn() + 'static) -> Subscription {
        let id = Id::next();
        let callback: Callback = Rc::new(f);
        let attached = RUNTIME.with(|runtime| {
            let mut notifiers = runtime.notifiers.borrow_mut();
            match notifiers.get_mut(&self.id) {
                Some(state) => {
                    state.subscribers.push((id, callback));
                    runtime.retain_subscription();
                    true
                }
                None => false,
            }
        });
        Subscription {
            notifier: self.id,
            id,
            attached,
        }
    }

    /// Run every subscriber.
    ///
    /// The subscriber list is snapshotted before running, so subscribers may
    /// subscribe, unsubscribe, or notify again. A subscriber removed by an
    /// earlier subscriber in the same pass is skipped.
    pub fn notify(&self) {
        let snapshot: SmallVec<[(Id, Callback); 4]> = RUNTIME.with(|runtime| {
            runtime
                .notifiers
                .borrow()
                .get(&self.id)
                .map(|state| state.subscribers.iter().cloned().collect())
                .unwrap_or_default()
        });
        for (id, callback) in snapshot {
            if self.has_subscriber(id) {
                callback();
            }
        }
    }

    fn has_subscriber(&self, subscriber: Id) -> bool {
        RUNTIME.with(|runtime| {
            runtime
                .notifiers
                .borrow()
                .get(&self.id)
                .is_some_and(|state| state.subscribers.iter().any(|(id, _)| *id == subscriber))
        })
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        RUNTIME.with(|runtime| {
            runtime
                .notifiers
                .borrow()
                .get(&self.id)
                .map_or(0, |state| state.subscribers.len())
        })
    }

    pub fn is_disposed(&self) -> bool {
        RUNTIME.with(|runtime| !runtime.notifiers.borrow().contains_key(&self.id))
    }

    /// Dispose the notifier, dropping every subscriber.
    pub fn dispose(&self) {
        self.id.dispose();
    }
}

/// A live registration of a closure on a [`Notifier`].
///
/// Dropping the subscription removes the closure; there is no way to leave a
/// subscriber registered without holding its `Subscription`.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    notifier: Id,
    id: Id,
    attached: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("notifier", &self.notifier)
            .field("id", &self.id)
            .field("attached", &self.attached)
            .finish()
    }
}

impl Subscription {
    /// Whether the subscriber is still registered on a live notifier.
    pub fn is_active(&self) -> bool {
        self.attached && (Notifier { id: self.notifier }).has_subscriber(self.id)
    }

    /// Remove the subscriber. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        // the runtime may already be gone when a subscription is dropped during thread teardown
        let removed = RUNTIME
            .try_with(|runtime| {
                let mut notifiers = runtime.notifiers.borrow_mut();
                let state = notifiers.get_mut(&self.notifier)?;
                let index = state.subscribers.iter().position(|(id, _)| *id == self.id)?;
                runtime.release_subscriptions(1);
                Some(state.subscribers.remove(index))
            })
            .ok()
            .flatten();
        drop(removed);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
