//! gix-backed object read/write and tree editing.

use gix::objs::tree::EntryKind;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{CommitInfo, EntryMode, GitOid, Signature, TreeEdit, TreeEntry};

pub(crate) const fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::Sha1(*oid.as_bytes())
}

pub(crate) fn from_gix_oid(oid: &gix::oid) -> GitOid {
    let src = oid.as_bytes();
    let mut bytes = [0u8; 20];
    let len = src.len().min(bytes.len());
    bytes[..len].copy_from_slice(&src[..len]);
    GitOid::from_bytes(bytes)
}

const fn from_gix_kind(kind: EntryKind) -> EntryMode {
    match kind {
        EntryKind::Tree => EntryMode::Tree,
        EntryKind::Blob => EntryMode::Blob,
        EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        EntryKind::Link => EntryMode::Link,
        EntryKind::Commit => EntryMode::Commit,
    }
}

const fn to_gix_kind(mode: EntryMode) -> EntryKind {
    match mode {
        EntryMode::Blob => EntryKind::Blob,
        EntryMode::BlobExecutable => EntryKind::BlobExecutable,
        EntryMode::Tree => EntryKind::Tree,
        EntryMode::Link => EntryKind::Link,
        EntryMode::Commit => EntryKind::Commit,
    }
}

fn to_gix_signature(sig: &Signature, time: gix::date::Time) -> gix::actor::Signature {
    gix::actor::Signature {
        name: sig.name.as_str().into(),
        email: sig.email.as_str().into(),
        time,
    }
}

pub fn read_tree(repo: &GixRepo, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("tree {oid}: {e}"),
        })?;

    tree.iter()
        .map(|entry| {
            let entry = entry.map_err(|e| GitError::BackendError {
                message: format!("failed to decode entry of tree {oid}: {e}"),
            })?;
            Ok(TreeEntry {
                name: entry.inner.filename.to_string(),
                mode: from_gix_kind(entry.inner.mode.kind()),
                oid: from_gix_oid(entry.inner.oid),
            })
        })
        .collect()
}

pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("commit {oid}: {e}"),
        })?;

    let decoded = commit.decode().map_err(|e| GitError::BackendError {
        message: format!("failed to decode commit {oid}: {e}"),
    })?;

    let author = decoded.author();
    let committer = decoded.committer();

    Ok(CommitInfo {
        tree_oid: from_gix_oid(&decoded.tree()),
        parents: decoded.parents().map(|p| from_gix_oid(&p)).collect(),
        message: decoded.message.to_string(),
        author: format!("{} <{}>", author.name, author.email),
        committer: format!("{} <{}>", committer.name, committer.email),
    })
}

pub fn write_blob(repo: &GixRepo, data: &[u8]) -> Result<GitOid, GitError> {
    let id = repo.repo.write_blob(data).map_err(|e| GitError::BackendError {
        message: format!("failed to write blob: {e}"),
    })?;
    Ok(from_gix_oid(&id.detach()))
}

pub fn write_tree(repo: &GixRepo, entries: &[TreeEntry]) -> Result<GitOid, GitError> {
    let mut entries: Vec<gix::objs::tree::Entry> = entries
        .iter()
        .map(|e| gix::objs::tree::Entry {
            mode: to_gix_kind(e.mode).into(),
            filename: e.name.as_str().into(),
            oid: to_gix_oid(e.oid),
        })
        .collect();
    entries.sort();
    let tree = gix::objs::Tree { entries };
    let id = repo
        .repo
        .write_object(&tree)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write tree: {e}"),
        })?;
    Ok(from_gix_oid(&id.detach()))
}

pub fn create_commit(
    repo: &GixRepo,
    tree: GitOid,
    parents: &[GitOid],
    message: &str,
    author: &Signature,
    committer: &Signature,
) -> Result<GitOid, GitError> {
    let time = gix::date::Time::now_local_or_utc();
    let commit = gix::objs::Commit {
        message: message.into(),
        tree: to_gix_oid(tree),
        author: to_gix_signature(author, time),
        committer: to_gix_signature(committer, time),
        encoding: None,
        parents: parents.iter().map(|p| to_gix_oid(*p)).collect(),
        extra_headers: Vec::new(),
    };
    let id = repo
        .repo
        .write_object(&commit)
        .map_err(|e| GitError::BackendError {
            message: format!("failed to write commit object: {e}"),
        })?;
    Ok(from_gix_oid(&id.detach()))
}

pub fn edit_tree(repo: &GixRepo, base: GitOid, edits: &[TreeEdit]) -> Result<GitOid, GitError> {
    let tree = repo
        .repo
        .find_tree(to_gix_oid(base))
        .map_err(|e| GitError::NotFound {
            message: format!("base tree {base}: {e}"),
        })?;

    let mut editor = tree.edit().map_err(|e| GitError::BackendError {
        message: format!("failed to create tree editor: {e}"),
    })?;

    for edit in edits {
        match edit {
            TreeEdit::Upsert { path, mode, oid } => {
                editor
                    .upsert(path.as_str(), to_gix_kind(*mode), to_gix_oid(*oid))
                    .map_err(|e| GitError::BackendError {
                        message: format!("tree edit upsert '{path}': {e}"),
                    })?;
            }
            TreeEdit::Remove { path } => {
                editor
                    .remove(path.as_str())
                    .map_err(|e| GitError::BackendError {
                        message: format!("tree edit remove '{path}': {e}"),
                    })?;
            }
        }
    }

    let new_id = editor.write().map_err(|e| GitError::BackendError {
        message: format!("failed to write edited tree: {e}"),
    })?;
    Ok(from_gix_oid(&new_id.detach()))
}
