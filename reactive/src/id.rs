use std::sync::atomic::AtomicU64;

use crate::runtime::RUNTIME;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Hash)]
/// A stable identifier for a reactive element.
pub(crate) struct Id(u64);

impl Id {
    pub(crate) fn next() -> Id {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Id(COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }

    /// Record this element as owned by the current scope.
    pub(crate) fn set_scope(&self) {
        RUNTIME.with(|runtime| {
            let scope = runtime.current_scope.borrow();
            let mut children = runtime.children.borrow_mut();
            let children = children.entry(*scope).or_default();
            children.insert(*self);
        });
    }

    /// Remove this element, everything it owns, and every subscription attached to it.
    pub(crate) fn dispose(&self) {
        let (children, notifier, property) = RUNTIME.with(|runtime| {
            (
                runtime.children.borrow_mut().remove(self),
                runtime.notifiers.borrow_mut().remove(self),
                runtime.properties.borrow_mut().remove(self),
            )
        });

        if let Some(notifier) = &notifier {
            RUNTIME.with(|runtime| runtime.release_subscriptions(notifier.subscribers.len()));
        }
        // values and subscriber closures may run drop code that touches the runtime,
        // so they are dropped only after every borrow above has been released
        drop(notifier);
        drop(property);

        if let Some(children) = children {
            for child in children {
                child.dispose();
            }
        }
    }
}
