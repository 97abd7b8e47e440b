//! The write orchestrator.
//!
//! Validates a request, derives the document path and base version, hands a
//! single file operation to the [`MergeEngine`], and turns the outcome into
//! a [`Document`] or a classified [`DocError`].
//!
//! The orchestrator keeps no per-call state: concurrent calls on one instance
//! are ordered and checked by the engine's compare-and-commit on the branch.
//! The only shared state is the lazily opened repository handle, which is
//! initialised at most once.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

use serde_json::Value;
use tracing::instrument;

use crate::engine::{EngineError, MergeEngine};
use crate::error::{DocError, ID_POINTER, TYPE_POINTER, VERSION_POINTER, classify};
use crate::identity::{CommitMeta, DEFAULT_SHORT_ID_LEN, ProcessIdentity};
use crate::model::{
    ActingUser, Document, DocumentDraft, DocumentMeta, FileOp, OpKind, check_segment,
    document_path,
};

/// Number of random bytes in a generated id (hex-encoded to 40 characters).
pub const GENERATED_ID_BYTES: usize = 20;

/// Replacement id source, mainly for deterministic tests.
pub type IdGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Progress of a create call.
///
/// `Attempting` repeats for as long as freshly generated ids collide; any
/// other outcome either succeeds or leaves the loop with an error.
enum CreateState {
    Attempting { attempt: u32 },
    Succeeded { document: Document, attempts: u32 },
}

pub struct Orchestrator<E: MergeEngine> {
    engine: E,
    repo_path: PathBuf,
    handle: OnceLock<E::Handle>,
    open_lock: Mutex<()>,
    identity: ProcessIdentity,
    id_generator: Option<IdGenerator>,
    short_id_len: usize,
}

impl<E: MergeEngine> Orchestrator<E> {
    /// An orchestrator writing to the repository at `repo_path`, committing as
    /// the current process.
    pub fn new(engine: E, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            repo_path: repo_path.into(),
            handle: OnceLock::new(),
            open_lock: Mutex::new(()),
            identity: ProcessIdentity::detect(),
            id_generator: None,
            short_id_len: DEFAULT_SHORT_ID_LEN,
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: ProcessIdentity) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, generator: IdGenerator) -> Self {
        self.id_generator = Some(generator);
        self
    }

    #[must_use]
    pub const fn with_short_id_len(mut self, len: usize) -> Self {
        self.short_id_len = len;
        self
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub const fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    // -----------------------------------------------------------------------
    // Public write API
    // -----------------------------------------------------------------------

    /// Store a new document.
    ///
    /// Without a caller-supplied id, a random one is generated and replaced
    /// for as long as it collides with an existing document. A supplied id
    /// that is taken fails with [`DocError::IdAlreadyInUse`].
    #[instrument(skip_all, fields(branch = %branch, doc_type = %expected_type))]
    pub fn create(
        &self,
        branch: &str,
        user: &ActingUser,
        expected_type: &str,
        draft: DocumentDraft,
    ) -> Result<Document, DocError> {
        let doc_type = check_type(expected_type, draft.doc_type.as_deref())?;
        if let Some(id) = &draft.id {
            check_id(id)?;
        }
        let content = encode(&draft.attributes);
        let handle = self.handle()?;
        let generated = draft.id.is_none();

        let mut state = CreateState::Attempting { attempt: 1 };
        loop {
            state = match state {
                CreateState::Attempting { attempt } => {
                    let id = match &draft.id {
                        Some(id) => id.clone(),
                        None => self.generate_id()?,
                    };
                    let op = FileOp::create(document_path(doc_type, &id), content.clone());
                    let meta = self.commit_meta(user, OpKind::Create, doc_type, &id);
                    match self
                        .engine
                        .propose_change(handle, None, branch, &[op], &meta)
                    {
                        Ok(version) => CreateState::Succeeded {
                            document: Document {
                                id,
                                doc_type: doc_type.to_owned(),
                                attributes: draft.attributes.clone(),
                                meta: DocumentMeta { version },
                            },
                            attempts: attempt,
                        },
                        Err(EngineError::PathAlreadyExists { path }) if generated => {
                            tracing::warn!(attempt, %path, "generated id collided, retrying");
                            CreateState::Attempting {
                                attempt: attempt + 1,
                            }
                        }
                        Err(err) => return Err(classify(err)),
                    }
                }
                CreateState::Succeeded { document, attempts } => {
                    tracing::info!(
                        id = %document.id,
                        version = %document.meta.version,
                        attempts,
                        "document created"
                    );
                    return Ok(document);
                }
            };
        }
    }

    /// Replace the attributes of an existing document.
    ///
    /// `document.meta.version` must be the version the caller last observed;
    /// if the document changed since, the update fails with
    /// [`DocError::MergeConflict`] and is not retried.
    #[instrument(skip_all, fields(branch = %branch, doc_type = %expected_type, id = %id))]
    pub fn update(
        &self,
        branch: &str,
        user: &ActingUser,
        expected_type: &str,
        id: &str,
        document: DocumentDraft,
    ) -> Result<Document, DocError> {
        let doc_type = check_type(expected_type, document.doc_type.as_deref())?;
        let body_id = document.id.as_deref().ok_or(DocError::MissingField {
            pointer: ID_POINTER,
        })?;
        if body_id != id {
            return Err(DocError::IdMismatch {
                expected: id.to_owned(),
                found: body_id.to_owned(),
            });
        }
        check_id(id)?;
        let base = document.version().ok_or(DocError::MissingField {
            pointer: VERSION_POINTER,
        })?;

        let handle = self.handle()?;
        let op = FileOp::update(document_path(doc_type, id), encode(&document.attributes));
        let meta = self.commit_meta(user, OpKind::Update, doc_type, id);
        let version = self
            .engine
            .propose_change(handle, Some(base), branch, &[op], &meta)
            .map_err(classify)?;

        tracing::info!(%version, base, "document updated");
        Ok(Document {
            id: id.to_owned(),
            doc_type: doc_type.to_owned(),
            attributes: document.attributes,
            meta: DocumentMeta { version },
        })
    }

    /// Remove a document.
    ///
    /// With a `version`, the delete only succeeds if the document is
    /// unchanged since that version. Without one, the document is removed
    /// from the branch tip.
    #[instrument(skip_all, fields(branch = %branch, doc_type = %expected_type, id = ?id))]
    pub fn delete(
        &self,
        branch: &str,
        user: &ActingUser,
        version: Option<&str>,
        expected_type: &str,
        id: Option<&str>,
    ) -> Result<(), DocError> {
        let doc_type = type_segment(expected_type)?;
        let id = id.ok_or(DocError::MissingField {
            pointer: ID_POINTER,
        })?;
        check_id(id)?;
        if version.is_none() {
            tracing::warn!("delete without a version, removing from branch tip unchecked");
        }

        let handle = self.handle()?;
        let op = FileOp::delete(document_path(doc_type, id));
        let meta = self.commit_meta(user, OpKind::Delete, doc_type, id);
        let new_version = self
            .engine
            .propose_change(handle, version, branch, &[op], &meta)
            .map_err(classify)?;

        tracing::info!(version = %new_version, "document deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// The repository handle, opened on first use.
    fn handle(&self) -> Result<&E::Handle, DocError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let _guard = self
            .open_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = self.handle.get() {
            return Ok(handle);
        }
        let opened = self.engine.open(&self.repo_path).map_err(classify)?;
        tracing::debug!(path = %self.repo_path.display(), "repository opened");
        Ok(self.handle.get_or_init(|| opened))
    }

    fn generate_id(&self) -> Result<String, DocError> {
        let id = self
            .id_generator
            .as_ref()
            .map_or_else(random_id, |generate| generate());
        check_id(&id)?;
        Ok(id)
    }

    fn commit_meta(&self, user: &ActingUser, kind: OpKind, doc_type: &str, id: &str) -> CommitMeta {
        CommitMeta::build(&self.identity, user, kind, doc_type, id, self.short_id_len)
    }
}

/// 20 bytes from the thread-local CSPRNG, hex-encoded.
#[must_use]
pub fn random_id() -> String {
    let bytes: [u8; GENERATED_ID_BYTES] = rand::random();
    bytes.iter().fold(
        String::with_capacity(GENERATED_ID_BYTES * 2),
        |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}

fn check_type<'a>(expected: &'a str, found: Option<&str>) -> Result<&'a str, DocError> {
    let found = found.ok_or(DocError::MissingField {
        pointer: TYPE_POINTER,
    })?;
    if found != expected {
        return Err(DocError::InvalidType {
            expected: expected.to_owned(),
            found: found.to_owned(),
        });
    }
    type_segment(expected)
}

fn type_segment(doc_type: &str) -> Result<&str, DocError> {
    match check_segment(doc_type) {
        Some(reason) => Err(DocError::InvalidField {
            pointer: TYPE_POINTER,
            reason,
        }),
        None => Ok(doc_type),
    }
}

fn check_id(id: &str) -> Result<(), DocError> {
    match check_segment(id) {
        Some(reason) => Err(DocError::InvalidField {
            pointer: ID_POINTER,
            reason,
        }),
        None => Ok(()),
    }
}

fn encode(attributes: &Value) -> Vec<u8> {
    format!("{attributes:#}\n").into_bytes()
}
