//! Building nodes from templates, and templates from JSON documents.
//!
//! ```rust
//! use arbor::Factory;
//!
//! let factory = Factory::new();
//! let root = factory
//!     .instantiate_json(r#"{ "kind": "Group", "name": "hud", "children": [
//!         { "kind": "Group", "name": "left" },
//!         { "kind": "Group", "name": "right", "enabled": false }
//!     ] }"#)
//!     .unwrap();
//! assert_eq!(root.children().len(), 2);
//! assert!(!root.find_named("right").unwrap().is_enabled());
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    binding::{FromValue, Value},
    error::FactoryError,
    group::GroupTemplate,
    id::NodeId,
    node::{Component, NodeKey, mount},
    template::{Template, TemplateBase},
};

/// Mount a default-constructed `C`.
pub fn create<C: Component + Default>() -> NodeKey {
    mount(Box::new(C::default()))
}

/// Mount a default-constructed `C` and configure it from `template`.
pub fn create_and_configure<C: Component + Default>(template: &dyn Template) -> NodeKey {
    let key = create::<C>();
    key.configure(template);
    key
}

/// Mount the component `template` describes and configure it.
pub fn instantiate(template: &dyn Template) -> NodeKey {
    let key = mount(template.instantiate());
    key.configure(template);
    key
}

fn default_enabled() -> bool {
    true
}

/// A declarative template document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TemplateSpec>,
}

/// Everything a kind builder gets to make its template from.
pub struct TemplateParts<'a> {
    pub kind: &'a str,
    pub base: TemplateBase,
    pub properties: &'a BTreeMap<String, Value>,
    pub children: Vec<Arc<dyn Template>>,
}

impl TemplateParts<'_> {
    /// Read an optional property as a `V`.
    pub fn property<V: FromValue>(&self, name: &str) -> Result<Option<V>, FactoryError> {
        let Some(value) = self.properties.get(name) else {
            return Ok(None);
        };
        V::from_value(value.clone())
            .map(Some)
            .map_err(|err| FactoryError::InvalidProperty {
                kind: self.kind.to_string(),
                property: name.to_string(),
                reason: err.to_string(),
            })
    }

    /// Fail if the document declared children for a kind that cannot hold them.
    pub fn no_children(&self) -> Result<(), FactoryError> {
        if self.children.is_empty() {
            Ok(())
        } else {
            Err(FactoryError::ChildrenNotSupported {
                kind: self.kind.to_string(),
            })
        }
    }
}

type KindBuilder =
    dyn Fn(TemplateParts<'_>) -> Result<Arc<dyn Template>, FactoryError> + Send + Sync;

/// Turns [`TemplateSpec`] documents into templates, and templates into nodes.
///
/// Kinds are registered by name. `"Group"` is always available.
#[derive(Clone, educe::Educe)]
#[educe(Debug)]
pub struct Factory {
    #[educe(Debug(method(debug_kinds)))]
    kinds: FxHashMap<String, Arc<KindBuilder>>,
}

fn debug_kinds(
    kinds: &FxHashMap<String, Arc<KindBuilder>>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let mut names: Vec<&String> = kinds.keys().collect();
    names.sort();
    f.debug_list().entries(names).finish()
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    pub fn new() -> Self {
        let mut factory = Factory {
            kinds: FxHashMap::default(),
        };
        factory.register("Group", |parts| {
            Ok(Arc::new(GroupTemplate {
                base: parts.base,
                children: parts.children,
            }))
        });
        factory
    }

    /// Register (or replace) the builder for `kind`.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        builder: impl Fn(TemplateParts<'_>) -> Result<Arc<dyn Template>, FactoryError>
        + Send
        + Sync
        + 'static,
    ) -> &mut Self {
        self.kinds.insert(kind.into(), Arc::new(builder));
        self
    }

    pub fn knows(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn create<C: Component + Default>(&self) -> NodeKey {
        create::<C>()
    }

    pub fn create_and_configure<C: Component + Default>(&self, template: &dyn Template) -> NodeKey {
        create_and_configure::<C>(template)
    }

    pub fn instantiate(&self, template: &dyn Template) -> NodeKey {
        instantiate(template)
    }

    /// Build the template tree a document describes, children first.
    pub fn template_from_spec(
        &self,
        spec: &TemplateSpec,
    ) -> Result<Arc<dyn Template>, FactoryError> {
        let builder = self
            .kinds
            .get(&spec.kind)
            .ok_or_else(|| FactoryError::UnknownKind(spec.kind.clone()))?;
        let children = spec
            .children
            .iter()
            .map(|child| self.template_from_spec(child))
            .collect::<Result<Vec<_>, _>>()?;
        let base = TemplateBase {
            id: spec.id,
            name: spec.name.clone(),
            enabled: spec.enabled,
            bindings: Vec::new(),
        };
        builder(TemplateParts {
            kind: &spec.kind,
            base,
            properties: &spec.properties,
            children,
        })
    }

    pub fn template_from_json(&self, json: &str) -> Result<Arc<dyn Template>, FactoryError> {
        let spec: TemplateSpec = serde_json::from_str(json)?;
        self.template_from_spec(&spec)
    }

    /// Parse `json`, build its templates and instantiate the root.
    pub fn instantiate_json(&self, json: &str) -> Result<NodeKey, FactoryError> {
        let template = self.template_from_json(json)?;
        let key = instantiate(template.as_ref());
        debug!(node = %key, name = %key.name(), "instantiated from document");
        Ok(key)
    }
}
