//! Commit identity and message construction.
//!
//! Every commit records two identities: the author is the human who asked
//! for the change, the committer is the running process that executed it.
//! The committer is derived once from the host and OS user and never changes
//! for the lifetime of an [`Orchestrator`](crate::Orchestrator).

use gitdoc_git::Signature;

use crate::model::{ActingUser, OpKind};

/// Default number of trailing id characters shown in commit messages.
pub const DEFAULT_SHORT_ID_LEN: usize = 8;

/// Identity of the running process, used as the committer of every write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessIdentity {
    committer: Signature,
}

impl ProcessIdentity {
    /// Derive the identity from the current process: `PID{n} on {host}` /
    /// `{user}@{host}`.
    #[must_use]
    pub fn detect() -> Self {
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "unknown".into());
        let user = whoami::username();
        Self::from_parts(std::process::id(), &user, &host)
    }

    #[must_use]
    pub fn from_parts(pid: u32, user: &str, host: &str) -> Self {
        Self {
            committer: Signature::new(format!("PID{pid} on {host}"), format!("{user}@{host}")),
        }
    }

    /// Use an explicit committer instead of the process-derived one.
    #[must_use]
    pub const fn fixed(committer: Signature) -> Self {
        Self { committer }
    }

    #[must_use]
    pub const fn committer(&self) -> &Signature {
        &self.committer
    }
}

/// Everything a proposed change records besides the tree itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitMeta {
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitMeta {
    /// Metadata for `kind` applied to `(doc_type, id)` on behalf of `user`.
    #[must_use]
    pub fn build(
        identity: &ProcessIdentity,
        user: &ActingUser,
        kind: OpKind,
        doc_type: &str,
        id: &str,
        short_id_len: usize,
    ) -> Self {
        Self {
            author: Signature::new(user.name.as_str(), user.email.as_str()),
            committer: identity.committer().clone(),
            message: commit_message(kind, doc_type, id, short_id_len),
        }
    }
}

/// `"{operation} {type} {shortId}"`.
#[must_use]
pub fn commit_message(kind: OpKind, doc_type: &str, id: &str, short_id_len: usize) -> String {
    format!("{kind} {doc_type} {}", short_id(id, short_id_len))
}

/// The last `len` characters of `id` (all of it if shorter). Display only;
/// two ids may share a short form.
#[must_use]
pub fn short_id(id: &str, len: usize) -> &str {
    let skip = id.chars().count().saturating_sub(len);
    id.char_indices().nth(skip).map_or("", |(at, _)| &id[at..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committer_from_parts() {
        let identity = ProcessIdentity::from_parts(4242, "svc", "db-1");
        assert_eq!(identity.committer().name, "PID4242 on db-1");
        assert_eq!(identity.committer().email, "svc@db-1");
    }

    #[test]
    fn detect_uses_current_pid() {
        let identity = ProcessIdentity::detect();
        let expected = format!("PID{} on ", std::process::id());
        assert!(identity.committer().name.starts_with(&expected));
        assert!(identity.committer().email.contains('@'));
    }

    #[test]
    fn short_id_takes_suffix() {
        assert_eq!(short_id("0123456789abcdef", 8), "89abcdef");
        assert_eq!(short_id("abc", 8), "abc");
        assert_eq!(short_id("", 8), "");
        assert_eq!(short_id("héllo", 3), "llo");
        assert_eq!(short_id("abc", 0), "");
    }

    #[test]
    fn meta_separates_author_and_committer() {
        let identity = ProcessIdentity::from_parts(1, "svc", "host");
        let user = ActingUser::new("Alice", "alice@example.com");
        let meta = CommitMeta::build(&identity, &user, OpKind::Update, "widget", "0123456789", 4);
        assert_eq!(meta.author, Signature::new("Alice", "alice@example.com"));
        assert_eq!(meta.committer, Signature::new("PID1 on host", "svc@host"));
        assert_eq!(meta.message, "update widget 6789");
    }
}
