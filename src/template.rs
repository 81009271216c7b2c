//! Templates: the immutable descriptions nodes are configured from.

use std::{any::Any, sync::Arc};

use crate::{binding::PropertyBindingDefinition, id::NodeId, node::AnyComponent};

/// The fields every template carries.
#[derive(Clone, Debug)]
pub struct TemplateBase {
    /// Identity given to configured nodes. `None` keeps the node's own id.
    pub id: Option<NodeId>,
    pub name: String,
    pub enabled: bool,
    pub bindings: Vec<PropertyBindingDefinition>,
}

impl Default for TemplateBase {
    fn default() -> Self {
        TemplateBase {
            id: None,
            name: String::new(),
            enabled: true,
            bindings: Vec::new(),
        }
    }
}

impl TemplateBase {
    pub fn new(name: impl Into<String>) -> Self {
        TemplateBase {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn binding(mut self, binding: PropertyBindingDefinition) -> Self {
        self.bindings.push(binding);
        self
    }
}

/// A description of a node: its base fields, optional subcomponents, and how
/// to build the component it configures.
///
/// Templates are `Send + Sync` so they can be built and shared off the
/// simulation thread; components themselves are not.
pub trait Template: Any + Send + Sync {
    fn base(&self) -> &TemplateBase;

    /// The children to build on configure. `None` for kinds that never have any.
    fn subcomponents(&self) -> Option<&[Arc<dyn Template>]> {
        None
    }

    /// Build an unconfigured component of the kind this template describes.
    fn instantiate(&self) -> AnyComponent;
}

impl dyn Template {
    pub fn is<T: Template>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    pub fn downcast_ref<T: Template>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}
