use std::{any::TypeId, borrow::Cow};

use crate::{id::NodeId, node::NodeKey};

/// Whether the registry keeps a node reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    /// The registry vouches for the node.
    Strong,
    /// The node may be reclaimed; its key is checked against the arena on every use.
    Weak,
}

impl Liveness {
    pub(crate) fn for_enabled(enabled: bool) -> Self {
        if enabled {
            Liveness::Strong
        } else {
            Liveness::Weak
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegistryEntry {
    pub id: NodeId,
    /// `None` while the entry is only a reservation.
    pub key: Option<NodeKey>,
    pub kind: Option<TypeId>,
    pub kind_name: Cow<'static, str>,
    pub liveness: Liveness,
    pub enabled: bool,
    pub visible: bool,
}

impl RegistryEntry {
    /// The node's key, if the entry still refers to a live node.
    ///
    /// Weak entries are checked against the arena of the calling thread, so
    /// off the simulation thread only strong entries upgrade.
    pub fn upgrade(&self) -> Option<NodeKey> {
        let key = self.key?;
        match self.liveness {
            Liveness::Strong => Some(key),
            Liveness::Weak => key.is_valid().then_some(key),
        }
    }

    pub fn is_reservation(&self) -> bool {
        self.key.is_none()
    }
}
