//! gix-backed ref and ancestry operations.

use gix::reference::edit::Error as EditError;
use gix::refs::file::transaction::prepare::Error as PrepareError;
use gix::refs::transaction::{Change, LogChange, PreviousValue, RefLog};
use gix::refs::{FullName, Target};

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::objects_impl::{from_gix_oid, to_gix_oid};
use crate::types::{GitOid, RefEdit, RefName};

pub fn read_ref(repo: &GixRepo, name: &RefName) -> Result<Option<GitOid>, GitError> {
    let Some(mut reference) = repo
        .repo
        .try_find_reference(name.as_str())
        .map_err(GitError::backend)?
    else {
        return Ok(None);
    };
    let id = reference.peel_to_id_in_place().map_err(GitError::backend)?;
    Ok(Some(from_gix_oid(id.as_ref())))
}

pub fn atomic_ref_update(repo: &GixRepo, edits: &[RefEdit]) -> Result<(), GitError> {
    let gix_edits = edits
        .iter()
        .map(|edit| {
            let name: FullName = edit
                .name
                .as_str()
                .try_into()
                .map_err(|e: gix::validate::reference::name::Error| GitError::backend(e))?;

            let expected = if edit.expected_old_oid.is_zero() {
                PreviousValue::MustNotExist
            } else {
                PreviousValue::MustExistAndMatch(Target::Object(to_gix_oid(edit.expected_old_oid)))
            };

            Ok(gix::refs::transaction::RefEdit {
                change: Change::Update {
                    log: LogChange {
                        mode: RefLog::AndReference,
                        force_create_reflog: false,
                        message: edit.log_message.as_str().into(),
                    },
                    expected,
                    new: Target::Object(to_gix_oid(edit.new_oid)),
                },
                name,
                deref: false,
            })
        })
        .collect::<Result<Vec<_>, GitError>>()?;

    repo.repo.edit_references(gix_edits).map_err(|e| {
        if lost_race(&e) {
            let ref_name = edits
                .first()
                .map(|edit| edit.name.to_string())
                .unwrap_or_default();
            tracing::debug!(%ref_name, "ref compare-and-swap lost");
            GitError::RefConflict {
                ref_name,
                message: e.to_string(),
            }
        } else {
            GitError::backend(e)
        }
    })?;
    Ok(())
}

/// Whether a transaction failed because another writer touched the ref first.
fn lost_race(err: &EditError) -> bool {
    matches!(
        err,
        EditError::FileTransactionPrepare(
            PrepareError::ReferenceOutOfDate { .. }
                | PrepareError::MustNotExist { .. }
                | PrepareError::MustExist { .. }
                | PrepareError::LockAcquire { .. }
        )
    )
}

pub fn is_ancestor(repo: &GixRepo, ancestor: GitOid, descendant: GitOid) -> Result<bool, GitError> {
    if ancestor == descendant {
        return Ok(true);
    }
    let target = to_gix_oid(ancestor);
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(descendant)])
        .all()
        .map_err(GitError::backend)?;
    for info in walk {
        let info = info.map_err(GitError::backend)?;
        if info.id == target {
            return Ok(true);
        }
    }
    Ok(false)
}
