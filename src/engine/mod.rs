//! The merge-engine contract consumed by the orchestrator.
//!
//! An engine applies a list of [`FileOp`]s on top of a base version of a
//! branch as one atomic commit, or fails with a structured [`EngineError`].
//! All tree diffing and conflict detection lives behind this trait; the
//! orchestrator only reacts to the outcome.
//!
//! [`GitEngine`] is the implementation backed by a real git repository.

use std::path::Path;

use gitdoc_git::GitError;
use thiserror::Error;

use crate::identity::CommitMeta;
use crate::model::FileOp;

mod git;

pub use git::{DEFAULT_MAX_REF_RETRIES, GitEngine};

/// Opens the repository an engine operates on.
///
/// Opening may be repeated, but callers are expected to cache the handle.
pub trait RepoProvider {
    type Handle;

    fn open(&self, path: &Path) -> Result<Self::Handle, EngineError>;
}

/// Atomic, conflict-aware application of file operations to a branch.
pub trait MergeEngine: RepoProvider {
    /// Apply `ops` on top of `base` (the branch tip when `None`) within
    /// `branch`, returning the id of the new commit.
    ///
    /// Nothing is written when this fails.
    fn propose_change(
        &self,
        handle: &Self::Handle,
        base: Option<&str>,
        branch: &str,
        ops: &[FileOp],
        meta: &CommitMeta,
    ) -> Result<String, EngineError>;
}

/// Failure vocabulary of a [`MergeEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The branch moved since `base` in a way that cannot be merged with this
    /// change (e.g. the same object was modified or deleted concurrently).
    #[error("conflict at `{path}`: {message}")]
    ConflictDetected { path: String, message: String },

    /// An update or delete referenced an object that does not exist.
    #[error("object not found at `{path}`")]
    ObjectNotFound { path: String },

    /// A create targeted a path that is already occupied.
    #[error("path already exists: `{path}`")]
    PathAlreadyExists { path: String },

    /// The base version does not name a commit in the repository.
    #[error("cannot resolve version `{version}`: {reason}")]
    VersionUnresolvable { version: String, reason: String },

    /// Any failure of the underlying repository.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Engine-specific failure with no structured kind.
    #[error("{message}")]
    Other { message: String },
}
