//! Validation results and the tri-state validation cache.

use std::fmt;

use crate::node::NodeKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One problem reported by a component's validation hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub node: NodeKey,
    pub message: String,
    pub severity: Severity,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level} on {}: {}", self.node, self.message)
    }
}

/// Memo of the last validation verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationState {
    /// Needs validation.
    #[default]
    Unknown,
    Valid,
    Invalid,
}

impl ValidationState {
    pub fn verdict(&self) -> Option<bool> {
        match self {
            ValidationState::Unknown => None,
            ValidationState::Valid => Some(true),
            ValidationState::Invalid => Some(false),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        *self = ValidationState::Unknown;
    }
}

impl From<bool> for ValidationState {
    fn from(valid: bool) -> Self {
        if valid {
            ValidationState::Valid
        } else {
            ValidationState::Invalid
        }
    }
}

/// Collects problems during a component's validation hook.
pub struct ValidateCx {
    node: NodeKey,
    errors: Vec<ValidationError>,
}

impl ValidateCx {
    pub(crate) fn new(node: NodeKey) -> Self {
        Self {
            node,
            errors: Vec::new(),
        }
    }

    /// The node being validated.
    pub fn node(&self) -> NodeKey {
        self.node
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.errors.push(ValidationError {
            node: self.node,
            message: message.into(),
            severity,
        });
    }

    pub(crate) fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

/// Whether a freshly produced list of problems lets the node activate.
pub(crate) fn passes(errors: &[ValidationError]) -> bool {
    !errors.iter().any(|e| e.severity == Severity::Error)
}
