//! Git abstraction layer for gitdoc.
//!
//! This crate defines the [`GitRepo`] trait, the only interface through which
//! the document store touches git. Nothing outside this crate imports gix;
//! callers program against the trait and the value types in [`types`].
//!
//! # Crate layout
//!
//! - [`repo`]: the [`GitRepo`] trait definition.
//! - [`types`]: value types used in trait signatures ([`GitOid`], [`RefName`],
//!   [`TreeEntry`], [`TreeEdit`], [`Signature`], etc.).
//! - [`error`]: the [`GitError`] enum returned by all trait methods.

pub mod error;
pub mod repo;
pub mod types;

// gix-backed implementation modules
mod gix_repo;
mod objects_impl;
mod refs_impl;

pub use gix_repo::{GixRepo, SharedGixRepo};

pub use error::GitError;
pub use repo::GitRepo;
pub use types::{
    CommitInfo, EntryMode, GitOid, OidParseError, RefEdit, RefName, RefNameError, Signature,
    TreeEdit, TreeEntry,
};
