//! # Components and the node tree
//!
//! Every node in the tree is a [`Component`]: a user type that owns a
//! [`NodeKey`] and implements whichever lifecycle hooks it cares about. The
//! component itself is stored in a per-thread arena next to the node's
//! lifecycle state; the key is how you reach both.
//!
//! A minimal component exposing a bindable value looks like this:
//!
//! ```rust
//! use arbor::prelude::*;
//!
//! struct Player {
//!     key: NodeKey,
//!     health: Property<f64>,
//! }
//!
//! impl Player {
//!     fn new() -> Self {
//!         let key = NodeKey::new();
//!         Player { key, health: key.property(100.0) }
//!     }
//! }
//!
//! impl Component for Player {
//!     fn key(&self) -> NodeKey {
//!         self.key
//!     }
//!
//!     fn validate(&self, cx: &mut ValidateCx) {
//!         if self.health.get() < 0.0 {
//!             cx.error("health must not be negative");
//!         }
//!     }
//! }
//!
//! let player = mount(Box::new(Player::new()));
//! player.activate();
//! assert!(player.is_active());
//! ```
//!
//! Hooks run with the component mutably borrowed. Calling back into the
//! lifecycle of the *same* node from inside one of its hooks is refused and
//! logged; act on other nodes, or queue a deferred update with
//! [`NodeKey::defer`].

mod key;
pub(crate) mod state;
pub(crate) mod storage;

pub use key::{NodeKey, mount};
pub(crate) use key::short_kind_name;

use std::{any::Any, borrow::Cow};

use arbor_reactive::Notifier;

use crate::{lifecycle::UpdateCx, template::Template, validation::ValidateCx};

/// type erased [`Component`]
pub type AnyComponent = Box<dyn Component>;

/// The hooks a node type implements to take part in the shared lifecycle.
///
/// Only [`key`](Component::key) is required. Hooks are invoked by the
/// lifecycle methods on [`NodeKey`]: `configure`, `validate`, `activate`,
/// `update`, `deactivate` and `dispose`.
pub trait Component: Any {
    fn key(&self) -> NodeKey;

    /// The concrete type name. Not meant to be overridden.
    fn kind_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn debug_name(&self) -> Cow<'static, str> {
        short_kind_name(self.kind_name()).to_string().into()
    }

    /// Apply template values. Runs before any child of the template is built.
    fn configure(&mut self, template: &dyn Template) {
        let _ = template;
    }

    /// Report problems through `cx`. Only errors make the node invalid.
    fn validate(&self, cx: &mut ValidateCx) {
        let _ = cx;
    }

    /// Runs before the node's bindings are subscribed and before its children activate.
    fn activate(&mut self) {}

    /// Runs once per frame while the node is active, before its children update.
    fn update(&mut self, cx: &mut UpdateCx) {
        let _ = cx;
    }

    /// Runs after every child has been deactivated, before bindings are unsubscribed.
    fn deactivate(&mut self) {}

    /// Runs after every child has been disposed.
    fn dispose(&mut self) {}

    /// Return the component to a freshly constructed state before pooled reuse.
    fn reset(&mut self) {}

    /// A named change channel, used by bindings that select a notification
    /// explicitly instead of the source property's own.
    fn notifier(&self, name: &str) -> Option<Notifier> {
        let _ = name;
        None
    }
}
