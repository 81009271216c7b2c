use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use crate::node::{Component, NodeKey, short_kind_name};

type Predicate = dyn Fn(&dyn Component) -> bool + Send + Sync;

/// Matches nodes whose component is of one concrete type, optionally narrowed
/// by a predicate on that component.
#[derive(Clone)]
pub struct TypeFilter {
    kind: TypeId,
    kind_name: &'static str,
    predicate: Option<Arc<Predicate>>,
}

impl TypeFilter {
    pub fn of<T: Component>() -> Self {
        TypeFilter {
            kind: TypeId::of::<T>(),
            kind_name: std::any::type_name::<T>(),
            predicate: None,
        }
    }

    pub fn of_where<T: Component>(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        TypeFilter {
            predicate: Some(Arc::new(move |c: &dyn Component| {
                (c as &dyn Any).downcast_ref::<T>().is_some_and(&predicate)
            })),
            ..Self::of::<T>()
        }
    }

    pub fn matches(&self, key: NodeKey) -> bool {
        if key.kind() != Some(self.kind) {
            return false;
        }
        match &self.predicate {
            None => true,
            Some(predicate) => key.with_dyn(|c| predicate(c)).unwrap_or(false),
        }
    }
}

impl fmt::Debug for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short_kind_name(self.kind_name))?;
        if self.predicate.is_some() {
            f.write_str(" where ..")?;
        }
        Ok(())
    }
}

/// How a binding finds its source node, relative to the node it is declared on.
#[derive(Clone, Debug)]
pub enum LookupStrategy {
    /// Nearest matching ancestor.
    Parent(TypeFilter),
    /// First matching child of the parent, never the node itself.
    Sibling(TypeFilter),
    /// First matching direct child.
    Child(TypeFilter),
    /// Depth-first search of the whole tree by name.
    Named(String),
    /// Like [`Parent`](LookupStrategy::Parent), for nodes that act as a
    /// configuration scope for their subtree.
    Context(TypeFilter),
}

impl LookupStrategy {
    pub fn parent<T: Component>() -> Self {
        LookupStrategy::Parent(TypeFilter::of::<T>())
    }

    pub fn parent_where<T: Component>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        LookupStrategy::Parent(TypeFilter::of_where(predicate))
    }

    pub fn sibling<T: Component>() -> Self {
        LookupStrategy::Sibling(TypeFilter::of::<T>())
    }

    pub fn sibling_where<T: Component>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        LookupStrategy::Sibling(TypeFilter::of_where(predicate))
    }

    pub fn child<T: Component>() -> Self {
        LookupStrategy::Child(TypeFilter::of::<T>())
    }

    pub fn child_where<T: Component>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        LookupStrategy::Child(TypeFilter::of_where(predicate))
    }

    pub fn context<T: Component>() -> Self {
        LookupStrategy::Context(TypeFilter::of::<T>())
    }

    pub fn context_where<T: Component>(
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        LookupStrategy::Context(TypeFilter::of_where(predicate))
    }

    pub fn named(name: impl Into<String>) -> Self {
        LookupStrategy::Named(name.into())
    }

    /// Find the source node for a binding declared on `from`.
    pub fn resolve(&self, from: NodeKey) -> Option<NodeKey> {
        match self {
            LookupStrategy::Parent(filter) | LookupStrategy::Context(filter) => {
                from.ancestors().into_iter().find(|a| filter.matches(*a))
            }
            LookupStrategy::Sibling(filter) => {
                from.siblings().into_iter().find(|s| filter.matches(*s))
            }
            LookupStrategy::Child(filter) => {
                from.children().into_iter().find(|c| filter.matches(*c))
            }
            LookupStrategy::Named(name) => from.find_named(name),
        }
    }
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupStrategy::Parent(filter) => write!(f, "Parent({filter:?})"),
            LookupStrategy::Sibling(filter) => write!(f, "Sibling({filter:?})"),
            LookupStrategy::Child(filter) => write!(f, "Child({filter:?})"),
            LookupStrategy::Named(name) => write!(f, "Named({name:?})"),
            LookupStrategy::Context(filter) => write!(f, "Context({filter:?})"),
        }
    }
}
