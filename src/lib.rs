//! # Arbor
//! Arbor is the runtime backbone for component trees: a hierarchy of stateful
//! nodes that share one lifecycle, and a binding layer that keeps one node's
//! value in step with another's without hand-written observer wiring.
//!
//! ## Example: a health label
//! ```rust
//! use arbor::prelude::*;
//!
//! struct Stat {
//!     key: NodeKey,
//!     health: Property<f64>,
//! }
//!
//! struct Label {
//!     key: NodeKey,
//!     text: String,
//! }
//!
//! impl Component for Stat {
//!     fn key(&self) -> NodeKey {
//!         self.key
//!     }
//! }
//!
//! impl Component for Label {
//!     fn key(&self) -> NodeKey {
//!         self.key
//!     }
//! }
//!
//! let key = NodeKey::new();
//! let health = key.property(75.0);
//! let stat = mount(Box::new(Stat { key, health }));
//!
//! let label = stat.add_child_component(Box::new(Label {
//!     key: NodeKey::new(),
//!     text: String::new(),
//! }));
//! let template = GroupTemplate::new("label").binding(
//!     PropertyBindingDefinition::builder::<Label>()
//!         .source(|stat: &Stat| stat.health)
//!         .format("Health: {0:F0}")
//!         .to(|label: &mut Label, text: String| label.text = text)
//!         .build(),
//! );
//! label.configure(&template);
//! stat.activate();
//!
//! let text = || label.with_component(|l: &Label| l.text.clone()).unwrap();
//! assert_eq!(text(), "Health: 75");
//! health.set(42.5);
//! assert_eq!(text(), "Health: 42");
//! ```
//!
//! ## Nodes
//! Every node is a [`Component`] stored in a per-thread arena and addressed by
//! a [`NodeKey`]. Keys are generation checked: once a node is disposed its key
//! goes stale and every operation on it becomes a no-op. Parent links are keys
//! too, so the tree never holds an owning back-reference.
//!
//! ## Lifecycle
//! `configure` → `validate` → `activate` → `update`… → `deactivate` →
//! `dispose`. Validation results are cached until something invalidates them,
//! and a node that fails validation simply stays inactive along with its
//! subtree. See the [`lifecycle`] module.
//!
//! ## Bindings
//! Declared on templates as [`PropertyBindingDefinition`]s, subscribed when
//! their node activates and dropped when it deactivates. See [`binding`].
//!
//! ## Registry
//! [`Registry`] is the one structure meant to be shared across threads: a
//! concurrent index of nodes by [`NodeId`] with strong and weak liveness, a
//! render order, per-kind pools, and a periodic sweep.

pub mod binding;
pub mod config;
pub mod error;
pub mod event;
pub mod factory;
pub mod group;
pub(crate) mod id;
pub mod lifecycle;
pub mod node;
pub mod registry;
pub mod template;
mod update;
pub mod validation;

pub use arbor_reactive as reactive;
pub use binding::{
    Converter, FromValue, LookupStrategy, PropertyBinding, PropertyBindingDefinition, Value,
};
pub use config::RegistryConfig;
pub use error::{AccessError, BindingError, ConfigError, ConvertError, FactoryError, UpdateError};
pub use event::{EventKind, LifecycleEvent, ListenerId};
pub use factory::{Factory, TemplateSpec, create, create_and_configure, instantiate};
pub use group::{Group, GroupTemplate};
pub use id::NodeId;
pub use lifecycle::{UpdateCx, step_frame};
pub use node::{AnyComponent, Component, NodeKey, mount};
pub use registry::{Liveness, Registry, RegistryEntry, SweepStats};
pub use template::{Template, TemplateBase};
pub use validation::{Severity, ValidateCx, ValidationError, ValidationState};

pub mod prelude {
    pub use crate::binding::{LookupStrategy, PropertyBindingDefinition, Value};
    pub use crate::error::UpdateError;
    pub use crate::event::{EventKind, LifecycleEvent};
    pub use crate::group::{Group, GroupTemplate};
    pub use crate::lifecycle::{UpdateCx, step_frame};
    pub use crate::node::{Component, NodeKey, mount};
    pub use crate::template::{Template, TemplateBase};
    pub use crate::validation::ValidateCx;
    pub use crate::{NodeId, Registry};
    pub use arbor_reactive::{Notifier, Property, Scope};
}
