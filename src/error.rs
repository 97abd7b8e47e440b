//! Domain errors of the write path.
//!
//! [`DocError`] is what callers of the [`Orchestrator`](crate::Orchestrator)
//! see. Each variant carries an HTTP-like status and, where it makes sense, a
//! JSON pointer to the offending request field, so a client can render a
//! field-specific message and decide whether re-reading and re-submitting can
//! help.
//!
//! Engine failures are translated by [`classify`]. Anything it does not
//! recognise is passed through untouched as [`DocError::Unclassified`].

use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;

pub const ID_POINTER: &str = "/data/id";
pub const TYPE_POINTER: &str = "/data/type";
pub const VERSION_POINTER: &str = "/data/meta/version";

/// Errors returned by create, update and delete.
#[derive(Debug, Error)]
pub enum DocError {
    /// The request omitted a required field.
    #[error("missing required field `{pointer}`")]
    MissingField { pointer: &'static str },

    /// The declared type does not match the collection being written.
    #[error("type `{found}` is not allowed here, expected `{expected}`")]
    InvalidType { expected: String, found: String },

    /// A type or id that cannot be used to address a document.
    #[error("invalid value at `{pointer}`: {reason}")]
    InvalidField {
        pointer: &'static str,
        reason: &'static str,
    },

    /// The id in the request body differs from the addressed document.
    #[error("id `{found}` does not match the addressed document `{expected}`")]
    IdMismatch { expected: String, found: String },

    /// The version token does not name a known version.
    #[error("invalid version: {source}")]
    InvalidVersion { source: EngineError },

    /// A concurrent change diverged from the caller's version.
    #[error("merge conflict: {source}")]
    MergeConflict { source: EngineError },

    /// A caller-supplied id is already taken.
    #[error("id already in use: {source}")]
    IdAlreadyInUse { source: EngineError },

    /// The referenced document does not exist.
    #[error("document not found: {source}")]
    NotFound { source: EngineError },

    /// Any other engine or repository failure, unchanged.
    #[error(transparent)]
    Unclassified(EngineError),
}

/// Translate an engine failure into the domain taxonomy.
///
/// The create path handles collisions of generated ids itself and never
/// lets them reach this function.
#[must_use]
pub fn classify(err: EngineError) -> DocError {
    match err {
        e @ EngineError::VersionUnresolvable { .. } => DocError::InvalidVersion { source: e },
        e @ EngineError::ConflictDetected { .. } => DocError::MergeConflict { source: e },
        e @ EngineError::PathAlreadyExists { .. } => DocError::IdAlreadyInUse { source: e },
        e @ EngineError::ObjectNotFound { .. } => DocError::NotFound { source: e },
        other => DocError::Unclassified(other),
    }
}

impl DocError {
    /// HTTP-like status class.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::MissingField { .. } | Self::InvalidField { .. } | Self::InvalidVersion { .. } => {
                400
            }
            Self::NotFound { .. } => 404,
            Self::InvalidType { .. }
            | Self::IdMismatch { .. }
            | Self::MergeConflict { .. }
            | Self::IdAlreadyInUse { .. } => 409,
            Self::Unclassified(_) => 500,
        }
    }

    /// JSON pointer to the request field the error is about.
    #[must_use]
    pub const fn pointer(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { pointer } | Self::InvalidField { pointer, .. } => Some(*pointer),
            Self::InvalidType { .. } => Some(TYPE_POINTER),
            Self::InvalidVersion { .. } => Some(VERSION_POINTER),
            Self::IdMismatch { .. } | Self::IdAlreadyInUse { .. } | Self::NotFound { .. } => {
                Some(ID_POINTER)
            }
            Self::MergeConflict { .. } | Self::Unclassified(_) => None,
        }
    }

    /// Short, stable summary of the error kind.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "Missing required field",
            Self::InvalidType { .. } => "Type not allowed here",
            Self::InvalidField { .. } => "Invalid field",
            Self::IdMismatch { .. } => "ID mismatch",
            Self::InvalidVersion { .. } => "Invalid version",
            Self::MergeConflict { .. } => "Merge conflict",
            Self::IdAlreadyInUse { .. } => "ID already in use",
            Self::NotFound { .. } => "Not found",
            Self::Unclassified(_) => "Internal error",
        }
    }

    /// Whether re-reading the document and resubmitting may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::MergeConflict { .. })
    }

    /// Client-facing representation of this error.
    #[must_use]
    pub fn to_error_object(&self) -> ErrorObject {
        ErrorObject {
            status: self.status().to_string(),
            title: self.title(),
            detail: self.to_string(),
            source: self.pointer().map(|pointer| ErrorSource { pointer }),
        }
    }
}

/// Serializable error body: `{"status", "title", "detail", "source": {"pointer"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorSource {
    pub pointer: &'static str,
}
