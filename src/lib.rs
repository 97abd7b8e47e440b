//! gitdoc: the write path of a JSON document store kept in a git repository.
//!
//! Every create, update and delete becomes one commit on a branch. The id of
//! that commit is handed back as the document's version, and callers present
//! it again on their next write: a write based on a stale version fails
//! instead of silently overwriting a concurrent change.
//!
//! - [`Orchestrator`] validates requests, owns id generation and the
//!   collision-retry loop, and classifies failures.
//! - [`engine`] defines the merge-engine contract and the git-backed
//!   [`GitEngine`].
//! - [`error`] holds the domain error taxonomy ([`DocError`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod orchestrator;
pub mod telemetry;

pub use engine::{EngineError, GitEngine, MergeEngine, RepoProvider};
pub use error::{DocError, ErrorObject, classify};
pub use identity::{CommitMeta, ProcessIdentity};
pub use model::{ActingUser, Document, DocumentDraft, DocumentMeta, FileOp, OpKind};
pub use orchestrator::{IdGenerator, Orchestrator};
