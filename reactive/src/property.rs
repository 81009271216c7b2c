use std::{
    any::Any,
    cell::{Ref, RefCell},
    fmt,
    marker::PhantomData,
    rc::Rc,
};

use crate::{id::Id, notifier::Notifier, runtime::RUNTIME};

/// A `Copy` handle to a value that notifies its subscribers whenever it is written.
///
/// Properties are how components expose bindable state: a binding reads the
/// value through the handle and subscribes to [`Property::notifier`], so neither
/// side has to borrow the owning component while the value changes.
pub struct Property<T> {
    pub(crate) id: Id,
    pub(crate) changed: Notifier,
    pub(crate) ty: PhantomData<T>,
}

impl<T> Copy for Property<T> {}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for Property<T> {}

impl<T> PartialEq for Property<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Property");
        s.field("id", &self.id);
        s.field("ty", &std::any::type_name::<T>());
        s.finish()
    }
}

impl<T: Any + 'static> Property<T> {
    /// Create a property owned by the current [`Scope`](crate::Scope).
    pub fn new(value: T) -> Self {
        let id = Id::next();
        let cell: Rc<dyn Any> = Rc::new(RefCell::new(value));
        RUNTIME.with(|runtime| runtime.properties.borrow_mut().insert(id, cell));
        id.set_scope();
        let changed = Notifier::new();
        Property {
            id,
            changed,
            ty: PhantomData,
        }
    }

    fn cell(&self) -> Option<Rc<dyn Any>> {
        RUNTIME.with(|runtime| runtime.properties.borrow().get(&self.id).cloned())
    }

    /// The change channel fired after every write.
    pub fn notifier(&self) -> Notifier {
        self.changed
    }

    pub fn is_disposed(&self) -> bool {
        self.cell().is_none()
    }

    /// Run `f` with a reference to the value, or return `None` if the property was disposed.
    pub fn try_with<O>(&self, f: impl FnOnce(&T) -> O) -> Option<O> {
        let cell = self.cell()?;
        let cell = cell.downcast_ref::<RefCell<T>>()?;
        let value: Ref<'_, T> = cell.try_borrow().ok()?;
        Some(f(&value))
    }

    /// Run `f` with a reference to the value.
    ///
    /// # Panics
    /// Panics if the property was disposed or is being written.
    pub fn with<O>(&self, f: impl FnOnce(&T) -> O) -> O {
        self.try_with(f)
            .expect("property disposed or already mutably borrowed")
    }

    /// Overwrite the value without notifying.
    pub fn set_untracked(&self, value: T) {
        self.update_untracked(|v| *v = value);
    }

    /// Mutate the value without notifying. Returns `false` if the property was disposed.
    pub fn update_untracked(&self, f: impl FnOnce(&mut T)) -> bool {
        let Some(cell) = self.cell() else {
            return false;
        };
        let Some(cell) = cell.downcast_ref::<RefCell<T>>() else {
            return false;
        };
        let Ok(mut value) = cell.try_borrow_mut() else {
            return false;
        };
        f(&mut value);
        true
    }

    /// Overwrite the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.update(|v| *v = value);
    }

    /// Mutate the value and notify subscribers.
    ///
    /// The value borrow is released before subscribers run, so they may read
    /// the property (and write it again).
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        if self.update_untracked(f) {
            self.changed.notify();
        }
    }

    /// Dispose the value and its change notifier.
    pub fn dispose(&self) {
        self.changed.dispose();
        self.id.dispose();
    }
}

impl<T: Clone + 'static> Property<T> {
    /// A clone of the current value, or `None` if the property was disposed.
    pub fn try_get(&self) -> Option<T> {
        self.try_with(T::clone)
    }

    /// A clone of the current value.
    ///
    /// # Panics
    /// Panics if the property was disposed.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: PartialEq + 'static> Property<T> {
    /// Write `value` and notify only if it differs from the current value.
    pub fn set_if_changed(&self, value: T) -> bool {
        let changed = self.try_with(|v| *v != value).unwrap_or(false);
        if changed {
            self.set(value);
        }
        changed
    }
}
