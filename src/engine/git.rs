//! Merge engine backed by a git repository.
//!
//! A proposal reads the branch tip, checks every operation against it,
//! rebases the change onto the tip when the caller's base is older but the
//! touched paths are unchanged since, writes one commit, and publishes it with
//! a compare-and-swap on the branch ref. Losing that race restarts the whole
//! proposal against the new tip.

use std::path::Path;
use std::time::Duration;

use gitdoc_git::{
    EntryMode, GitError, GitOid, GitRepo, RefEdit, RefName, SharedGixRepo, TreeEdit, TreeEntry,
};
use tracing::instrument;

use super::{EngineError, MergeEngine, RepoProvider};
use crate::identity::CommitMeta;
use crate::model::{FileOp, OpKind};

/// Default number of times a proposal is replayed after losing the branch
/// ref race.
pub const DEFAULT_MAX_REF_RETRIES: u32 = 32;

/// Unit of the randomized pause between replays.
const BACKOFF_BASE: Duration = Duration::from_millis(1);

/// The pause ceiling stops doubling after this many replays (64 ms).
const BACKOFF_MAX_SHIFT: u32 = 6;

/// [`MergeEngine`] over a local git repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GitEngine {
    max_ref_retries: u32,
}

impl Default for GitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GitEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_ref_retries: DEFAULT_MAX_REF_RETRIES,
        }
    }

    #[must_use]
    pub const fn with_max_ref_retries(mut self, retries: u32) -> Self {
        self.max_ref_retries = retries;
        self
    }
}

impl RepoProvider for GitEngine {
    type Handle = SharedGixRepo;

    fn open(&self, path: &Path) -> Result<Self::Handle, EngineError> {
        Ok(SharedGixRepo::open(path)?)
    }
}

impl MergeEngine for GitEngine {
    fn propose_change(
        &self,
        handle: &Self::Handle,
        base: Option<&str>,
        branch: &str,
        ops: &[FileOp],
        meta: &CommitMeta,
    ) -> Result<String, EngineError> {
        let repo = handle.to_local();
        propose(&repo, base, branch, ops, meta, self.max_ref_retries)
    }
}

/// A base version resolved to its commit and root tree.
#[derive(Clone, Copy, Debug)]
struct Resolved {
    commit: GitOid,
    tree: GitOid,
}

#[instrument(skip_all, fields(branch = %branch, base = base.unwrap_or("<tip>"), ops = ops.len()))]
pub(crate) fn propose(
    repo: &dyn GitRepo,
    base: Option<&str>,
    branch: &str,
    ops: &[FileOp],
    meta: &CommitMeta,
    max_ref_retries: u32,
) -> Result<String, EngineError> {
    let branch_ref = RefName::branch(branch).map_err(|e| EngineError::Other {
        message: e.to_string(),
    })?;
    let base = base.map(|v| resolve_version(repo, v)).transpose()?;

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let tip = repo.read_ref(&branch_ref)?;
        let commit = build_commit(repo, branch, tip, base, ops, meta)?;
        let edit = RefEdit {
            name: branch_ref.clone(),
            new_oid: commit,
            expected_old_oid: tip.unwrap_or(GitOid::ZERO),
            log_message: meta.message.clone(),
        };
        match repo.atomic_ref_update(&[edit]) {
            Ok(()) => {
                tracing::debug!(%commit, attempt, "branch advanced");
                return Ok(commit.to_string());
            }
            Err(GitError::RefConflict { .. }) if attempt <= max_ref_retries => {
                let pause = backoff(attempt);
                tracing::debug!(attempt, ?pause, "branch moved during proposal, replaying");
                std::thread::sleep(pause);
            }
            Err(GitError::RefConflict { message, .. }) => {
                return Err(EngineError::ConflictDetected {
                    path: branch_ref.to_string(),
                    message: format!("branch kept moving after {attempt} attempts: {message}"),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Random pause in `[0, BACKOFF_BASE * 2^attempt)`, capped, so writers that
/// lost the same race do not collide again in lockstep.
fn backoff(attempt: u32) -> Duration {
    let ceiling = BACKOFF_BASE.saturating_mul(1 << attempt.min(BACKOFF_MAX_SHIFT));
    ceiling.mul_f64(rand::random::<f64>())
}

fn resolve_version(repo: &dyn GitRepo, version: &str) -> Result<Resolved, EngineError> {
    let unresolvable = |reason: String| EngineError::VersionUnresolvable {
        version: version.to_owned(),
        reason,
    };
    let commit: GitOid = version
        .parse()
        .map_err(|e: gitdoc_git::OidParseError| unresolvable(e.reason))?;
    match repo.read_commit(commit) {
        Ok(info) => Ok(Resolved {
            commit,
            tree: info.tree_oid,
        }),
        Err(GitError::NotFound { message }) => Err(unresolvable(message)),
        Err(e) => Err(e.into()),
    }
}

fn build_commit(
    repo: &dyn GitRepo,
    branch: &str,
    tip: Option<GitOid>,
    base: Option<Resolved>,
    ops: &[FileOp],
    meta: &CommitMeta,
) -> Result<GitOid, EngineError> {
    let tip_tree = tip.map(|t| repo.read_commit(t)).transpose()?.map(|c| c.tree_oid);

    let mut at_tip = Vec::with_capacity(ops.len());
    for op in ops {
        let entry = entry_at(repo, tip_tree, &op.path)?;
        match (op.kind, &entry) {
            (OpKind::Create, Some(_)) => {
                return Err(EngineError::PathAlreadyExists {
                    path: op.path.clone(),
                });
            }
            (OpKind::Update | OpKind::Delete, None) => {
                return Err(EngineError::ObjectNotFound {
                    path: op.path.clone(),
                });
            }
            _ => {}
        }
        at_tip.push(entry);
    }

    if let Some(base) = base.filter(|b| Some(b.commit) != tip) {
        check_unchanged_since(repo, branch, base, tip, ops, &at_tip)?;
    }

    let mut edits = Vec::with_capacity(ops.len());
    for op in ops {
        let edit = match (op.kind, &op.content) {
            (OpKind::Create | OpKind::Update, Some(content)) => TreeEdit::Upsert {
                path: op.path.clone(),
                mode: EntryMode::Blob,
                oid: repo.write_blob(content)?,
            },
            (OpKind::Create | OpKind::Update, None) => {
                return Err(EngineError::Other {
                    message: format!("{} of `{}` carries no content", op.kind, op.path),
                });
            }
            (OpKind::Delete, _) => TreeEdit::Remove {
                path: op.path.clone(),
            },
        };
        edits.push(edit);
    }

    let root = match tip_tree {
        Some(tree) => tree,
        None => repo.write_tree(&[])?,
    };
    let tree = repo.edit_tree(root, &edits)?;
    let parents: Vec<GitOid> = tip.into_iter().collect();
    Ok(repo.create_commit(tree, &parents, &meta.message, &meta.author, &meta.committer)?)
}

/// A change based on an older version may only land if that version is in
/// the branch history and none of the touched paths moved since.
fn check_unchanged_since(
    repo: &dyn GitRepo,
    branch: &str,
    base: Resolved,
    tip: Option<GitOid>,
    ops: &[FileOp],
    at_tip: &[Option<TreeEntry>],
) -> Result<(), EngineError> {
    let in_history = match tip {
        Some(tip) => repo.is_ancestor(base.commit, tip)?,
        None => false,
    };
    if !in_history {
        return Err(EngineError::ConflictDetected {
            path: branch.to_owned(),
            message: format!("version {} is not in the history of `{branch}`", base.commit),
        });
    }
    for (op, current) in ops.iter().zip(at_tip) {
        let then = entry_at(repo, Some(base.tree), &op.path)?;
        if &then != current {
            return Err(EngineError::ConflictDetected {
                path: op.path.clone(),
                message: format!("changed since version {}", base.commit),
            });
        }
    }
    Ok(())
}

/// The entry at a slash-separated `path` below `tree`, if any.
fn entry_at(
    repo: &dyn GitRepo,
    tree: Option<GitOid>,
    path: &str,
) -> Result<Option<TreeEntry>, GitError> {
    let Some(mut current) = tree else {
        return Ok(None);
    };
    let mut components = path.split('/').peekable();
    while let Some(name) = components.next() {
        let Some(entry) = repo.read_tree(current)?.into_iter().find(|e| e.name == name) else {
            return Ok(None);
        };
        if components.peek().is_none() {
            return Ok(Some(entry));
        }
        if entry.mode != EntryMode::Tree {
            return Ok(None);
        }
        current = entry.oid;
    }
    Ok(None)
}
