//! # `NodeId`s
//!
//! [`NodeId`]s identify nodes independently of where they sit in the tree.
//! They are derived from a domain-separated SHA-256 digest truncated to 128
//! bits, so equal inputs always produce equal ids and ids built from different
//! kinds of input (a string and a type name that happen to be spelled the same)
//! never collide by construction.

use std::{any::type_name, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// A hash-derived, position-independent node identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u128);

impl NodeId {
    /// A transient id that will not match any hashed id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().as_u128())
    }

    /// A stable id for `name`. Equal strings always give equal ids.
    pub fn from_string(name: &str) -> Self {
        Self::hashed(b"node:", [name.as_bytes()])
    }

    /// One id per type, for singleton-style nodes.
    pub fn from_type<T: ?Sized + 'static>() -> Self {
        Self::hashed(b"type:", [type_name::<T>().as_bytes()])
    }

    /// A stable id for a composite of parts, joined with `/` before hashing.
    ///
    /// `from_parts(["ui", "hud"])` and `from_parts(["ui/hud"])` are equal.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.push('/');
            }
            joined.push_str(part.as_ref());
        }
        Self::hashed(b"path:", [joined.as_bytes()])
    }

    fn hashed<'a>(domain: &[u8], parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        for part in parts {
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(u128::from_be_bytes(bytes))
    }

    /// The raw 128-bit value.
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl From<u128> for NodeId {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
