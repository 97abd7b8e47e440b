//! The [`GitRepo`] trait, the boundary between the document
//! store and git.
//!
//! Operations the store needs, by group:
//!
//! | Group        | Methods                                           |
//! |--------------|---------------------------------------------------|
//! | Refs         | `read_ref`, `atomic_ref_update`                   |
//! | Object read  | `read_tree`, `read_commit`                        |
//! | Object write | `write_blob`, `write_tree`, `create_commit`       |
//! | Tree editing | `edit_tree`                                       |
//! | Ancestry     | `is_ancestor`                                     |

use crate::error::GitError;
use crate::types::{CommitInfo, GitOid, RefEdit, RefName, Signature, TreeEdit, TreeEntry};

/// Git access used by the document store.
///
/// Implemented by [`GixRepo`](crate::GixRepo). The trait is object-safe so
/// callers may hold `&dyn GitRepo`.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Refs
    // -----------------------------------------------------------------------

    /// Resolve a ref to its OID, returning `None` if the ref does not exist.
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError>;

    /// Atomically apply a batch of ref updates with compare-and-swap semantics.
    ///
    /// All updates succeed or all fail. If any ref's current value differs
    /// from its [`RefEdit::expected_old_oid`], nothing is written and
    /// [`GitError::RefConflict`] is returned.
    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Object read
    // -----------------------------------------------------------------------

    /// Read the entries of a tree (one level deep).
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit's metadata.
    ///
    /// Returns [`GitError::NotFound`] if `oid` does not name a commit.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    // -----------------------------------------------------------------------
    // Object write
    // -----------------------------------------------------------------------

    /// Write a blob to the object store and return its OID.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    /// Write a tree object from a list of entries and return its OID.
    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError>;

    /// Write a commit object with explicit author and committer.
    ///
    /// No ref is moved; publish the commit with
    /// [`atomic_ref_update`](Self::atomic_ref_update).
    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        author: &Signature,
        committer: &Signature,
    ) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Tree editing
    // -----------------------------------------------------------------------

    /// Apply `edits` to the tree `base` and return the OID of the new tree.
    ///
    /// Paths may be nested (`"contents/widget/abc.json"`); intermediate
    /// trees are created or updated as needed.
    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    /// Returns `true` if `ancestor` is reachable from `descendant` (or equal).
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError>;
}
