use std::{any::TypeId, borrow::Cow, collections::VecDeque, sync::Weak};

use arbor_reactive::Scope;
use bitflags::bitflags;

use crate::{
    binding::PropertyBinding,
    event::Listeners,
    id::NodeId,
    registry::Registry,
    update::DeferredUpdate,
    validation::{ValidationError, ValidationState},
};

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub(crate) struct NodeFlags: u8 {
        const ENABLED = 1 << 0;
        const CONFIGURED = 1 << 1;
        const ACTIVE = 1 << 2;
        const UNLOADED = 1 << 3;
        const UPDATING = 1 << 4;
        const VISIBLE = 1 << 5;
        const DEACTIVATING = 1 << 6;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::ENABLED | NodeFlags::VISIBLE
    }
}

/// Per-node lifecycle state, kept apart from the component so lifecycle
/// bookkeeping never needs to borrow user code.
pub(crate) struct NodeState {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: Option<TypeId>,
    pub(crate) kind_name: Cow<'static, str>,
    pub(crate) flags: NodeFlags,
    pub(crate) validation: ValidationState,
    pub(crate) validation_errors: Vec<ValidationError>,
    pub(crate) pending_updates: VecDeque<DeferredUpdate>,
    pub(crate) bindings: Vec<PropertyBinding>,
    pub(crate) listeners: Listeners,
    pub(crate) scope: Scope,
    pub(crate) registry: Option<Weak<Registry>>,
}

impl NodeState {
    pub(crate) fn new() -> Self {
        Self {
            id: NodeId::random(),
            name: String::new(),
            kind: None,
            kind_name: Cow::Borrowed(""),
            flags: NodeFlags::default(),
            validation: ValidationState::Unknown,
            validation_errors: Vec::new(),
            pending_updates: VecDeque::new(),
            bindings: Vec::new(),
            listeners: Listeners::default(),
            scope: Scope::new(),
            registry: None,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.flags.contains(NodeFlags::ACTIVE | NodeFlags::ENABLED)
    }
}
