//! The gix-backed implementation of [`GitRepo`].

use std::path::Path;

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{CommitInfo, GitOid, RefEdit, RefName, Signature, TreeEdit, TreeEntry};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// A `GixRepo` is bound to one thread. Obtain one from
/// [`SharedGixRepo::to_local`] for each use.
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
}

/// A repository handle that is `Send + Sync` and cheap to turn into a
/// thread-local [`GixRepo`].
pub struct SharedGixRepo {
    inner: gix::ThreadSafeRepository,
}

// Requires gix's `parallel` feature.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SharedGixRepo>();
};

impl SharedGixRepo {
    /// Open the git repository at or above `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let inner = gix::ThreadSafeRepository::discover(path).map_err(GitError::backend)?;
        tracing::debug!(path = %path.display(), "opened shared repository");
        Ok(Self { inner })
    }

    /// A thread-local view of the repository.
    #[must_use]
    pub fn to_local(&self) -> GixRepo {
        GixRepo {
            repo: self.inner.to_thread_local(),
        }
    }
}

impl GitRepo for GixRepo {
    // === Refs ===
    fn read_ref(&self, name: &RefName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::read_ref(self, name)
    }

    fn atomic_ref_update(&self, edits: &[RefEdit]) -> Result<(), GitError> {
        crate::refs_impl::atomic_ref_update(self, edits)
    }

    // === Object read ===
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        crate::objects_impl::read_tree(self, oid)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }

    // === Object write ===
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_blob(self, data)
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
        crate::objects_impl::write_tree(self, entries)
    }

    fn create_commit(
        &self,
        tree: GitOid,
        parents: &[GitOid],
        message: &str,
        author: &Signature,
        committer: &Signature,
    ) -> Result<GitOid, GitError> {
        crate::objects_impl::create_commit(self, tree, parents, message, author, committer)
    }

    // === Tree editing ===
    fn edit_tree(&self, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError> {
        crate::objects_impl::edit_tree(self, base, edits)
    }

    // === Ancestry ===
    fn is_ancestor(&self, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
        crate::refs_impl::is_ancestor(self, ancestor, descendant)
    }
}
