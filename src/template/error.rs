//! Error types for reference resolution

use thiserror::Error;

use crate::document::KeyPath;

/// Errors that can occur while resolving a document.
///
/// Resolution stops at the first error; no partially resolved document is
/// ever returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// A `Ref`, `Fn::GetAtt` or `${...}` that names nothing resolvable
    #[error("unresolved reference '{reference}' at {path}")]
    UnresolvedReference { path: KeyPath, reference: String },

    /// A parameter value outside its declared constraints
    #[error("parameter '{parameter}' value '{value}' violates {constraint} (at {path})")]
    ConstraintViolation {
        path: KeyPath,
        parameter: String,
        value: String,
        constraint: String,
    },

    /// A condition name with no declaration under `Conditions`
    #[error("undefined condition '{condition}' at {path}")]
    UndefinedCondition { path: KeyPath, condition: String },

    /// Conditions that refer to each other in a loop
    #[error("circular condition reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    /// A condition body outside the supported condition functions
    #[error("malformed condition at {path}: {reason}")]
    MalformedCondition { path: KeyPath, reason: String },

    /// A parameter declaration with an invalid constraint
    #[error("invalid parameter declaration at {path}: {reason}")]
    InvalidDeclaration { path: KeyPath, reason: String },

    /// A value of the wrong shape for where it is used
    #[error("type mismatch at {path}: {reason}")]
    TypeMismatch { path: KeyPath, reason: String },

    /// Every resource was removed by its condition
    #[error("no resources remain after applying conditions")]
    NoResources,
}

impl ResolveError {
    pub fn unresolved(path: &KeyPath, reference: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            path: path.clone(),
            reference: reference.into(),
        }
    }

    pub fn undefined_condition(path: &KeyPath, condition: impl Into<String>) -> Self {
        Self::UndefinedCondition {
            path: path.clone(),
            condition: condition.into(),
        }
    }

    pub fn malformed_condition(path: &KeyPath, reason: impl Into<String>) -> Self {
        Self::MalformedCondition {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn type_mismatch(path: &KeyPath, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Location in the document, when the error has one
    pub fn path(&self) -> Option<&KeyPath> {
        match self {
            Self::UnresolvedReference { path, .. }
            | Self::ConstraintViolation { path, .. }
            | Self::UndefinedCondition { path, .. }
            | Self::MalformedCondition { path, .. }
            | Self::InvalidDeclaration { path, .. }
            | Self::TypeMismatch { path, .. } => Some(path),
            Self::CircularReference { .. } | Self::NoResources => None,
        }
    }
}
