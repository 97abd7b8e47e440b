//! Value types shared between the [`GitRepo`](crate::GitRepo) trait and its
//! callers. None of them carry gix types; the backend stays an
//! implementation detail.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Displays as 40 lowercase hex characters. This is the string form the
/// document store hands out as a version token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// The zero OID, used in [`RefEdit`] to assert that a ref must not exist.
    pub const ZERO: Self = Self([0; 20]);

    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| OidParseError {
            value: s.to_owned(),
            reason,
        };
        if s.len() != 40 {
            return Err(invalid(format!(
                "expected 40 hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 20];
        for (slot, pair) in bytes.iter_mut().zip(s.as_bytes().chunks_exact(2)) {
            let hi = hex_value(pair[0])
                .ok_or_else(|| invalid(format!("invalid hex digit '{}'", pair[0] as char)))?;
            let lo = hex_value(pair[1])
                .ok_or_else(|| invalid(format!("invalid hex digit '{}'", pair[1] as char)))?;
            *slot = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a hex string into a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated, fully-qualified git ref name (`refs/...`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    /// Create a new `RefName`.
    ///
    /// # Errors
    /// Returns an error if the name is empty, does not start with `refs/`,
    /// or contains a component git would reject (`..`, whitespace, `~^:?*[\`).
    pub fn new(name: &str) -> Result<Self, RefNameError> {
        let reject = |reason: &str| RefNameError {
            value: name.to_owned(),
            reason: reason.to_owned(),
        };
        if !name.starts_with("refs/") || name.len() == "refs/".len() {
            return Err(reject("ref name must start with 'refs/' and name a ref"));
        }
        if name.contains("..") || name.ends_with('/') || name.ends_with(".lock") {
            return Err(reject("ref name contains an invalid component"));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
        {
            return Err(reject("ref name contains a forbidden character"));
        }
        Ok(Self(name.to_owned()))
    }

    /// The ref backing a local branch: `refs/heads/<branch>`.
    ///
    /// # Errors
    /// Returns an error if the branch name does not form a valid ref.
    pub fn branch(branch: &str) -> Result<Self, RefNameError> {
        Self::new(&format!("refs/heads/{branch}"))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RefName {
    type Err = RefNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Error from validating a [`RefName`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefNameError {
    /// The invalid value.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl fmt::Display for RefNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ref name {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for RefNameError {}

// ---------------------------------------------------------------------------
// RefEdit
// ---------------------------------------------------------------------------

/// A single compare-and-swap ref update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefEdit {
    /// The ref to update.
    pub name: RefName,
    /// The new OID to set the ref to.
    pub new_oid: GitOid,
    /// The value the ref must currently hold. [`GitOid::ZERO`] asserts that
    /// the ref must not exist yet.
    pub expected_old_oid: GitOid,
    /// Reflog message for the update.
    pub log_message: String,
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// The file mode of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
    /// Gitlink / submodule (`160000`).
    Commit,
}

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// Basename of the entry.
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob, tree, or commit this entry points to.
    pub oid: GitOid,
}

/// An edit applied by [`GitRepo::edit_tree`](crate::GitRepo::edit_tree).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeEdit {
    /// Insert or replace the entry at `path`, creating intermediate trees.
    Upsert {
        /// Slash-separated path relative to the tree root.
        path: String,
        /// File mode for the entry.
        mode: EntryMode,
        /// OID of the object to store at this path.
        oid: GitOid,
    },
    /// Remove the entry at `path`. No-op if absent.
    Remove {
        /// Slash-separated path relative to the tree root.
        path: String,
    },
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// Name and email stamped on a commit as author or committer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Metadata of a commit object, as returned by
/// [`GitRepo::read_commit`](crate::GitRepo::read_commit).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// OID of the tree this commit points to.
    pub tree_oid: GitOid,
    /// Parent commits (empty for a root commit).
    pub parents: Vec<GitOid>,
    /// The commit message.
    pub message: String,
    /// Author identity, e.g. `"Alice <alice@example.com>"`.
    pub author: String,
    /// Committer identity.
    pub committer: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
