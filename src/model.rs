//! Document values exchanged with callers, and the file-level operations the
//! orchestrator proposes to the merge engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root directory under which every document file lives.
pub const CONTENTS_DIR: &str = "contents";

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// A stored document as returned to callers.
///
/// Serializes as `{"id", "type", "attributes", "meta": {"version"}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub attributes: Value,
    pub meta: DocumentMeta,
}

/// Document metadata. `version` is the id of the commit that last wrote the
/// document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub version: String,
}

/// A document as submitted by a caller.
///
/// Every field is optional so that an incomplete request reaches validation
/// and is rejected with a pointer to the missing field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DraftMeta>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DocumentDraft {
    /// A draft of the given type with no id and no version.
    #[must_use]
    pub fn new(doc_type: impl Into<String>, attributes: Value) -> Self {
        Self {
            id: None,
            doc_type: Some(doc_type.into()),
            attributes,
            meta: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.meta = Some(DraftMeta {
            version: Some(version.into()),
        });
        self
    }

    /// The caller's last observed version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.version.as_deref())
    }
}

/// The human on whose behalf a write is made. Becomes the commit author.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActingUser {
    pub name: String,
    pub email: String,
}

impl ActingUser {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// What a single file operation does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl OpKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending change to one document file. Lives for a single
/// orchestrator call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileOp {
    pub kind: OpKind,
    pub path: String,
    /// File content for create/update; `None` for delete.
    pub content: Option<Vec<u8>>,
}

impl FileOp {
    #[must_use]
    pub const fn create(path: String, content: Vec<u8>) -> Self {
        Self {
            kind: OpKind::Create,
            path,
            content: Some(content),
        }
    }

    #[must_use]
    pub const fn update(path: String, content: Vec<u8>) -> Self {
        Self {
            kind: OpKind::Update,
            path,
            content: Some(content),
        }
    }

    #[must_use]
    pub const fn delete(path: String) -> Self {
        Self {
            kind: OpKind::Delete,
            path,
            content: None,
        }
    }
}

/// Storage location of a document: `contents/{type}/{id}.json`.
///
/// Both segments must already have passed [`check_segment`].
#[must_use]
pub fn document_path(doc_type: &str, id: &str) -> String {
    format!("{CONTENTS_DIR}/{doc_type}/{id}.json")
}

/// Why a type or id cannot be used as a path segment, or `None` if it can.
#[must_use]
pub fn check_segment(segment: &str) -> Option<&'static str> {
    if segment.is_empty() {
        return Some("must not be empty");
    }
    if segment == "." || segment == ".." {
        return Some("must not be a relative path component");
    }
    if segment.contains(['/', '\\', '\0']) {
        return Some("must not contain path separators or NUL");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn path_layout() {
        assert_eq!(document_path("widget", "abc"), "contents/widget/abc.json");
    }

    #[test]
    fn segments_rejected() {
        assert!(check_segment("").is_some());
        assert!(check_segment(".").is_some());
        assert!(check_segment("..").is_some());
        assert!(check_segment("a/b").is_some());
        assert!(check_segment("a\\b").is_some());
        assert!(check_segment("a\0b").is_some());
        assert!(check_segment("widget").is_none());
        assert!(check_segment("..hidden").is_none());
    }

    #[test]
    fn document_wire_shape() {
        let doc = Document {
            id: "abc".to_string(),
            doc_type: "widget".to_string(),
            attributes: json!({"a": 1}),
            meta: DocumentMeta {
                version: "f00".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"id": "abc", "type": "widget", "attributes": {"a": 1}, "meta": {"version": "f00"}})
        );
    }

    #[test]
    fn draft_accepts_missing_fields() {
        let draft: DocumentDraft = serde_json::from_value(json!({"attributes": {}})).unwrap();
        assert_eq!(draft.id, None);
        assert_eq!(draft.doc_type, None);
        assert_eq!(draft.version(), None);

        let draft: DocumentDraft =
            serde_json::from_value(json!({"type": "w", "meta": {"version": "v1"}})).unwrap();
        assert_eq!(draft.version(), Some("v1"));
        assert_eq!(draft.attributes, Value::Null);
    }

    proptest! {
        #[test]
        fn accepted_segments_stay_inside_their_directory(
            doc_type in "[^/\\\\\\x00]{1,12}",
            id in "[^/\\\\\\x00]{1,24}",
        ) {
            prop_assume!(check_segment(&doc_type).is_none() && check_segment(&id).is_none());
            let path = document_path(&doc_type, &id);
            let parts: Vec<&str> = path.split('/').collect();
            prop_assert_eq!(parts.len(), 3);
            prop_assert_eq!(parts[0], CONTENTS_DIR);
            prop_assert_eq!(parts[1], doc_type.as_str());
        }
    }
}
