use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

use smallvec::SmallVec;

use crate::id::Id;

thread_local! {
    pub(crate) static RUNTIME: Runtime = Runtime::new();
}

pub(crate) type Callback = Rc<dyn Fn()>;

/// Subscribers registered on a single notifier, in subscription order.
#[derive(Default)]
pub(crate) struct NotifierState {
    pub(crate) subscribers: SmallVec<[(Id, Callback); 2]>,
}

/// The reactive runtime. It stores every notifier and property of the current
/// thread in a thread local, so all handles are only meaningful on the thread
/// that created them.
pub struct Runtime {
    pub(crate) current_scope: RefCell<Id>,
    pub(crate) children: RefCell<HashMap<Id, HashSet<Id>>>,
    pub(crate) notifiers: RefCell<HashMap<Id, NotifierState>>,
    pub(crate) properties: RefCell<HashMap<Id, Rc<dyn Any>>>,
    pub(crate) live_subscriptions: Cell<usize>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub(crate) fn new() -> Self {
        Self {
            current_scope: RefCell::new(Id::next()),
            children: RefCell::new(HashMap::new()),
            notifiers: Default::default(),
            properties: Default::default(),
            live_subscriptions: Cell::new(0),
        }
    }

    pub(crate) fn retain_subscription(&self) {
        self.live_subscriptions
            .set(self.live_subscriptions.get() + 1);
    }

    pub(crate) fn release_subscriptions(&self, count: usize) {
        self.live_subscriptions
            .set(self.live_subscriptions.get().saturating_sub(count));
    }

    /// Number of subscriptions currently attached to live notifiers on this thread.
    ///
    /// This is the figure leak checks look at: every [`Subscription`](crate::Subscription)
    /// that is dropped or whose notifier is disposed is subtracted.
    pub fn live_subscriptions() -> usize {
        RUNTIME.with(|runtime| runtime.live_subscriptions.get())
    }

    /// Number of notifiers alive on this thread.
    pub fn live_notifiers() -> usize {
        RUNTIME.with(|runtime| runtime.notifiers.borrow().len())
    }

    /// Number of properties alive on this thread.
    pub fn live_properties() -> usize {
        RUNTIME.with(|runtime| runtime.properties.borrow().len())
    }
}
