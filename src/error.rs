//! Error types.
//!
//! Lifecycle and binding failures are recovered locally and logged; these
//! types give the log lines (and the few `Result`-returning APIs such as the
//! factory and config loaders) something structured to carry.

use thiserror::Error;

use crate::node::NodeKey;

/// Why a node's component could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("node {0} is no longer in the arena")]
    Stale(NodeKey),
    #[error("node {0} has no component mounted")]
    Unmounted(NodeKey),
    #[error("node {0} is already borrowed; re-entrant lifecycle call refused")]
    Reentrant(NodeKey),
}

/// Why a binding could not be activated. The binding stays inert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("no source found for lookup {lookup}")]
    SourceNotFound { lookup: String },
    #[error("source {source_kind} is not a {expected}")]
    SourceType {
        source_kind: String,
        expected: &'static str,
    },
    #[error("source {source_kind} has no notification named `{name}`")]
    NotificationNotFound { source_kind: String, name: String },
    #[error("source value is no longer available")]
    SourceDisposed,
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// A value could not be converted on its way from source to target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("malformed format pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("format `{spec}` does not apply to {found} values")]
    Format { spec: String, found: &'static str },
    #[error("expected a {expected} value, found {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
    #[error("cannot parse `{text}` as {expected}")]
    Parse { text: String, expected: &'static str },
    #[error("binding target is not a {expected}")]
    Target { expected: &'static str },
    #[error("{0}")]
    Custom(String),
}

/// A deferred update failed. Logged by the drain, never propagated.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{0}")]
    Failed(String),
    #[error("deferred update expected a {expected}")]
    TargetType { expected: &'static str },
    #[error("deferred update panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Access(#[from] AccessError),
}

impl UpdateError {
    pub fn failed(message: impl Into<String>) -> Self {
        UpdateError::Failed(message.into())
    }
}

/// A template document could not be turned into templates.
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("unknown template kind `{0}`")]
    UnknownKind(String),
    #[error("template kind `{kind}` does not take children")]
    ChildrenNotSupported { kind: String },
    #[error("invalid property `{property}` on `{kind}`: {reason}")]
    InvalidProperty {
        kind: String,
        property: String,
        reason: String,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
