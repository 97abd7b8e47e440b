//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo)
//! methods. Callers match on the variant (missing object, CAS mismatch, bad
//! OID) instead of parsing messages.

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object or ref was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A ref update lost its compare-and-swap: the ref no longer holds the
    /// expected old value.
    #[error("ref conflict on `{ref_name}`: {message}")]
    RefConflict {
        /// The ref that could not be updated.
        ref_name: String,
        /// Details about the mismatch.
        message: String,
    },

    /// An OID string could not be parsed.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred while touching the repository.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The gix backend returned an error that fits no other variant.
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

impl GitError {
    pub(crate) fn backend(e: impl std::fmt::Display) -> Self {
        Self::BackendError {
            message: e.to_string(),
        }
    }
}

impl From<crate::types::OidParseError> for GitError {
    fn from(e: crate::types::OidParseError) -> Self {
        Self::InvalidOid {
            value: e.value,
            reason: e.reason,
        }
    }
}
