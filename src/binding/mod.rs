//! # Property bindings
//!
//! A binding keeps a value on one node in step with a [`Property`] on another.
//! It is declared once, in a template, as a [`PropertyBindingDefinition`]:
//!
//! - a [`LookupStrategy`] that finds the source node relative to the node the
//!   binding is declared on (the target),
//! - a source selector returning one of the source component's properties,
//! - optionally the name of a different change notification to listen to,
//! - an optional [`Converter`],
//! - and the target setter.
//!
//! ```rust
//! use arbor::prelude::*;
//! # struct Stat { key: NodeKey, health: Property<f64> }
//! # impl Component for Stat { fn key(&self) -> NodeKey { self.key } }
//! # struct Label { key: NodeKey, text: String }
//! # impl Component for Label { fn key(&self) -> NodeKey { self.key } }
//!
//! let health_text = PropertyBindingDefinition::builder::<Label>()
//!     .lookup(LookupStrategy::parent::<Stat>())
//!     .source(|stat: &Stat| stat.health)
//!     .format("Health: {0:F0}")
//!     .to(|label: &mut Label, text: String| label.text = text)
//!     .build();
//! assert!(health_text.is_valid());
//! ```
//!
//! When the target activates, each binding resolves its source from scratch,
//! subscribes to the change notification and immediately copies the current
//! value across. Every later notification copies it again, synchronously.
//! Deactivation drops the subscription and forgets the source.

mod convert;
mod lookup;
mod value;

pub use convert::{Converter, format_value};
pub use lookup::{LookupStrategy, TypeFilter};
pub use value::{FromValue, Value};

use std::{
    any::Any,
    cell::Cell,
    fmt,
    marker::PhantomData,
    rc::Rc,
    sync::Arc,
};

use arbor_reactive::{Notifier, Property, Subscription};
use tracing::{debug, trace, warn};

use crate::{
    error::{AccessError, BindingError, ConvertError},
    node::{Component, NodeKey, short_kind_name},
};

/// What a binding reads from its resolved source.
pub struct SourceHandle {
    read: Rc<dyn Fn() -> Option<Value>>,
    changed: Notifier,
}

impl SourceHandle {
    pub fn from_property<V: Clone + Into<Value> + 'static>(property: Property<V>) -> Self {
        SourceHandle {
            read: Rc::new(move || property.try_get().map(Into::into)),
            changed: property.notifier(),
        }
    }
}

type SelectFn = dyn Fn(&dyn Component) -> Result<SourceHandle, BindingError> + Send + Sync;
type SetFn = dyn Fn(&mut dyn Component, Value) -> Result<(), ConvertError> + Send + Sync;

/// An immutable, template-time description of a binding.
#[derive(Clone, Default)]
pub struct PropertyBindingDefinition {
    lookup: Option<LookupStrategy>,
    change_selector: Option<String>,
    source: Option<Arc<SelectFn>>,
    converter: Option<Converter>,
    target_setter: Option<Arc<SetFn>>,
}

impl fmt::Debug for PropertyBindingDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBindingDefinition")
            .field("lookup", &self.lookup)
            .field("change_selector", &self.change_selector)
            .field("source", &self.source.is_some())
            .field("converter", &self.converter)
            .field("target_setter", &self.target_setter.is_some())
            .finish()
    }
}

impl PropertyBindingDefinition {
    /// Start a binding whose target component is a `T`.
    pub fn builder<T: Component>() -> BindingBuilder<T> {
        BindingBuilder {
            definition: PropertyBindingDefinition::default(),
            ty: PhantomData,
        }
    }

    /// A definition is usable only with a source and a target setter.
    /// Invalid definitions are dropped when a template is applied.
    pub fn is_valid(&self) -> bool {
        self.lookup.is_some() && self.source.is_some() && self.target_setter.is_some()
    }

    pub fn lookup(&self) -> Option<&LookupStrategy> {
        self.lookup.as_ref()
    }

    pub fn change_selector(&self) -> Option<&str> {
        self.change_selector.as_deref()
    }

    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }
}

/// Builder returned by [`PropertyBindingDefinition::builder`].
pub struct BindingBuilder<T> {
    definition: PropertyBindingDefinition,
    ty: PhantomData<fn(&mut T)>,
}

impl<T: Component> BindingBuilder<T> {
    /// Where to find the source. Defaults to the nearest ancestor of the
    /// source type given to [`source`](BindingBuilder::source).
    pub fn lookup(mut self, lookup: LookupStrategy) -> Self {
        self.definition.lookup = Some(lookup);
        self
    }

    /// The property to read from the source component, which must be an `S`.
    pub fn source<S: Component, V: Clone + Into<Value> + 'static>(
        mut self,
        select: impl Fn(&S) -> Property<V> + Send + Sync + 'static,
    ) -> Self {
        self.definition.source = Some(Arc::new(move |component: &dyn Component| {
            let source = (component as &dyn Any).downcast_ref::<S>().ok_or_else(|| {
                BindingError::SourceType {
                    source_kind: short_kind_name(component.kind_name()).to_string(),
                    expected: std::any::type_name::<S>(),
                }
            })?;
            Ok(SourceHandle::from_property(select(source)))
        }));
        if self.definition.lookup.is_none() {
            self.definition.lookup = Some(LookupStrategy::parent::<S>());
        }
        self
    }

    /// Listen to the source component's named notifier instead of the
    /// property's own change channel.
    pub fn on(mut self, notification: impl Into<String>) -> Self {
        self.definition.change_selector = Some(notification.into());
        self
    }

    pub fn format(mut self, pattern: &str) -> Self {
        self.definition.converter = Some(Converter::format(pattern));
        self
    }

    pub fn convert(
        mut self,
        f: impl Fn(Value) -> Result<Value, ConvertError> + Send + Sync + 'static,
    ) -> Self {
        self.definition.converter = Some(Converter::map(f));
        self
    }

    pub fn converter(mut self, converter: Converter) -> Self {
        self.definition.converter = Some(converter);
        self
    }

    /// The target setter. The converted value is turned into a `V` first; if
    /// that fails the target is left untouched.
    pub fn to<V: FromValue>(mut self, setter: impl Fn(&mut T, V) + Send + Sync + 'static) -> Self {
        self.definition.target_setter = Some(Arc::new(
            move |component: &mut dyn Component, value: Value| {
                let target = (component as &mut dyn Any).downcast_mut::<T>().ok_or(
                    ConvertError::Target {
                        expected: std::any::type_name::<T>(),
                    },
                )?;
                setter(target, V::from_value(value)?);
                Ok(())
            },
        ));
        self
    }

    pub fn build(self) -> PropertyBindingDefinition {
        self.definition
    }
}

/// A binding attached to a node. Created from a definition at configure time.
pub struct PropertyBinding {
    definition: PropertyBindingDefinition,
    source: Option<NodeKey>,
    subscription: Option<Subscription>,
    updating_from_source: Rc<Cell<bool>>,
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("definition", &self.definition)
            .field("source", &self.source)
            .field("active", &self.is_active())
            .finish()
    }
}

impl PropertyBinding {
    pub fn new(definition: PropertyBindingDefinition) -> Self {
        PropertyBinding {
            definition,
            source: None,
            subscription: None,
            updating_from_source: Rc::new(Cell::new(false)),
        }
    }

    pub fn definition(&self) -> &PropertyBindingDefinition {
        &self.definition
    }

    /// The resolved source, while active.
    pub fn source(&self) -> Option<NodeKey> {
        self.source
    }

    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Resolve the source, subscribe, and synchronize once.
    ///
    /// On error nothing is subscribed and the binding stays inert.
    pub fn activate(&mut self, target: NodeKey) -> Result<(), BindingError> {
        if self.is_active() {
            return Ok(());
        }
        let (Some(lookup), Some(select), Some(setter)) = (
            self.definition.lookup.as_ref(),
            self.definition.source.clone(),
            self.definition.target_setter.clone(),
        ) else {
            return Err(BindingError::SourceNotFound {
                lookup: "<incomplete definition>".to_string(),
            });
        };

        let source = lookup
            .resolve(target)
            .ok_or_else(|| BindingError::SourceNotFound {
                lookup: lookup.to_string(),
            })?;
        let handle = source.with_dyn(|c| select(c))??;
        let changed = match &self.definition.change_selector {
            None => handle.changed,
            Some(name) => source
                .with_dyn(|c| c.notifier(name))?
                .ok_or_else(|| BindingError::NotificationNotFound {
                    source_kind: source.kind_name(),
                    name: name.clone(),
                })?,
        };
        if changed.is_disposed() {
            return Err(BindingError::SourceDisposed);
        }

        let sync = Rc::new(BindingSync {
            target,
            read: handle.read,
            converter: self.definition.converter.clone(),
            setter,
            updating_from_source: self.updating_from_source.clone(),
        });
        let on_change = sync.clone();
        self.subscription = Some(changed.subscribe(move || on_change.run()));
        self.source = Some(source);
        debug!(target = %target, source = %source, %lookup, "binding activated");
        sync.run();
        Ok(())
    }

    /// Unsubscribe and forget the source. Idempotent.
    pub fn deactivate(&mut self) {
        self.subscription = None;
        self.source = None;
    }
}

/// The read, convert, set pipeline shared by the first sync and every notification.
struct BindingSync {
    target: NodeKey,
    read: Rc<dyn Fn() -> Option<Value>>,
    converter: Option<Converter>,
    setter: Arc<SetFn>,
    updating_from_source: Rc<Cell<bool>>,
}

/// Clears the re-entrancy flag when the sync finishes, even by unwinding.
struct SyncGuard<'a>(&'a Cell<bool>);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl BindingSync {
    fn run(&self) {
        if self.updating_from_source.replace(true) {
            trace!(target = %self.target, "re-entrant binding notification dropped");
            return;
        }
        let _guard = SyncGuard(&self.updating_from_source);

        let Some(value) = (self.read)() else {
            warn!(target = %self.target, "binding source value is gone");
            return;
        };
        let value = match &self.converter {
            Some(converter) => converter.convert(value),
            None => value,
        };

        match self
            .target
            .with_dyn_mut(|c| (self.setter)(c, value.clone()))
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(target = %self.target, error = %err, "binding target not updated")
            }
            Err(AccessError::Reentrant(_)) => {
                debug!(target = %self.target, "binding target busy; deferring the set");
                let setter = self.setter.clone();
                self.target
                    .defer_component(move |c| setter(c, value).map_err(Into::into));
            }
            Err(err) => debug!(target = %self.target, error = %err, "binding target unavailable"),
        }
    }
}
