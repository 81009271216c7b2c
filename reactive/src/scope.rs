use std::{any::Any, fmt};

use crate::{id::Id, notifier::Notifier, property::Property, runtime::RUNTIME};

/// An owner for notifiers and properties.
///
/// Everything created while a scope is current belongs to it, and disposing
/// the scope disposes all of it along with every child scope. Components get a
/// scope each so that tearing a node down releases the reactive state it made.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scope(pub(crate) Id);

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Scope");
        s.field("id", &self.0);
        s.finish()
    }
}

impl Scope {
    /// Create a new Scope that isn't a child or parent of any scope
    pub fn new() -> Self {
        Self(Id::next())
    }

    /// The scope new elements are currently attached to.
    pub fn current() -> Scope {
        RUNTIME.with(|runtime| Scope(*runtime.current_scope.borrow()))
    }

    /// Create a child Scope of this Scope
    pub fn create_child(&self) -> Scope {
        let child = Id::next();
        RUNTIME.with(|runtime| {
            let mut children = runtime.children.borrow_mut();
            let children = children.entry(self.0).or_default();
            children.insert(child);
        });
        Scope(child)
    }

    /// Run `f` with this scope as the current scope.
    pub fn enter<T>(&self, f: impl FnOnce() -> T) -> T {
        let prev_scope = RUNTIME.with(|runtime| {
            let mut current_scope = runtime.current_scope.borrow_mut();
            let prev_scope = *current_scope;
            *current_scope = self.0;
            prev_scope
        });

        let result = f();

        RUNTIME.with(|runtime| {
            *runtime.current_scope.borrow_mut() = prev_scope;
        });

        result
    }

    /// Create a Property under this Scope
    pub fn create_property<T: Any + 'static>(&self, value: T) -> Property<T> {
        self.enter(|| Property::new(value))
    }

    /// Create a Notifier under this Scope
    pub fn create_notifier(&self) -> Notifier {
        self.enter(Notifier::new)
    }

    /// Dispose everything owned by this scope and its children.
    pub fn dispose(&self) {
        self.0.dispose();
    }
}
