use std::{fmt, sync::Arc};

use crate::{
    binding::PropertyBindingDefinition,
    node::{AnyComponent, Component, NodeKey},
    template::{Template, TemplateBase},
};

/// A plain container node.
pub struct Group {
    key: NodeKey,
}

impl Group {
    pub fn new() -> Self {
        Group {
            key: NodeKey::new(),
        }
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Group {
    fn key(&self) -> NodeKey {
        self.key
    }
}

/// Template for a [`Group`] and the children declared under it.
#[derive(Clone, Default, educe::Educe)]
#[educe(Debug)]
pub struct GroupTemplate {
    pub base: TemplateBase,
    #[educe(Debug(method(debug_children)))]
    pub children: Vec<Arc<dyn Template>>,
}

fn debug_children(children: &[Arc<dyn Template>], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list()
        .entries(children.iter().map(|child| &child.base().name))
        .finish()
}

impl GroupTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        GroupTemplate {
            base: TemplateBase::new(name),
            children: Vec::new(),
        }
    }

    pub fn from_base(base: TemplateBase) -> Self {
        GroupTemplate {
            base,
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Template) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn binding(mut self, binding: PropertyBindingDefinition) -> Self {
        self.base.bindings.push(binding);
        self
    }
}

impl Template for GroupTemplate {
    fn base(&self) -> &TemplateBase {
        &self.base
    }

    fn subcomponents(&self) -> Option<&[Arc<dyn Template>]> {
        Some(&self.children)
    }

    fn instantiate(&self) -> AnyComponent {
        Box::new(Group::new())
    }
}
