//! Shared test helpers for gitdoc integration tests.
//!
//! Write-path tests drive the orchestrator against [`ScriptedEngine`], which
//! records every proposal and answers from a queue of canned outcomes.
//! Engine tests get their own git repo in a temp directory via
//! [`setup_repo()`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use gitdoc::{
    ActingUser, CommitMeta, EngineError, FileOp, IdGenerator, MergeEngine, Orchestrator,
    ProcessIdentity, RepoProvider,
};

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

/// One `propose_change` call as the engine saw it.
#[derive(Clone, Debug)]
pub struct Proposal {
    pub base: Option<String>,
    pub branch: String,
    pub ops: Vec<FileOp>,
    pub meta: CommitMeta,
}

/// Engine double: answers proposals from a queue, then succeeds with
/// sequential versions once the queue is drained.
#[derive(Default)]
pub struct ScriptedEngine {
    fail_open: bool,
    opens: AtomicUsize,
    outcomes: Mutex<VecDeque<Result<String, EngineError>>>,
    proposals: Mutex<Vec<Proposal>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine whose repository can never be opened.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Queue the outcome of the next unanswered proposal.
    pub fn then(self, outcome: Result<String, EngineError>) -> Self {
        self.outcomes.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue `n` collisions on whatever path is proposed.
    pub fn then_collisions(self, n: usize) -> Self {
        (0..n).fold(self, |engine, _| {
            engine.then(Err(EngineError::PathAlreadyExists {
                path: "contents/widget/taken.json".to_string(),
            }))
        })
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.proposals.lock().unwrap().len()
    }

    pub fn proposals(&self) -> Vec<Proposal> {
        self.proposals.lock().unwrap().clone()
    }

    pub fn last(&self) -> Proposal {
        self.proposals
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no proposal recorded")
    }
}

impl RepoProvider for ScriptedEngine {
    type Handle = PathBuf;

    fn open(&self, path: &Path) -> Result<PathBuf, EngineError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(EngineError::Other {
                message: format!("cannot open {}", path.display()),
            });
        }
        Ok(path.to_owned())
    }
}

impl MergeEngine for ScriptedEngine {
    fn propose_change(
        &self,
        _handle: &PathBuf,
        base: Option<&str>,
        branch: &str,
        ops: &[FileOp],
        meta: &CommitMeta,
    ) -> Result<String, EngineError> {
        let call = {
            let mut proposals = self.proposals.lock().unwrap();
            proposals.push(Proposal {
                base: base.map(str::to_owned),
                branch: branch.to_owned(),
                ops: ops.to_vec(),
                meta: meta.clone(),
            });
            proposals.len()
        };
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(version(call)))
    }
}

/// The version the scripted engine reports for its `n`-th call when nothing
/// is queued.
pub fn version(n: usize) -> String {
    format!("{n:040x}")
}

// ---------------------------------------------------------------------------
// Orchestrator setup
// ---------------------------------------------------------------------------

pub fn alice() -> ActingUser {
    ActingUser::new("Alice", "alice@example.com")
}

pub fn test_identity() -> ProcessIdentity {
    ProcessIdentity::from_parts(1, "svc", "test-host")
}

/// `id-0`, `id-1`, ... in call order.
pub fn sequential_ids() -> IdGenerator {
    let next = AtomicUsize::new(0);
    Box::new(move || format!("id-{}", next.fetch_add(1, Ordering::SeqCst)))
}

pub fn scripted(engine: ScriptedEngine) -> Orchestrator<ScriptedEngine> {
    Orchestrator::new(engine, "/srv/docs").with_identity(test_identity())
}

// ---------------------------------------------------------------------------
// Git repos
// ---------------------------------------------------------------------------

/// Fresh, empty git repo in a temp directory. `main` is unborn.
pub fn setup_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    git(dir.path(), &["init", "--quiet"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    dir
}

/// Run git in `dir` and return trimmed stdout. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Whether `rev` resolves in the repo at `dir`.
pub fn git_exists(dir: &Path, rev: &str) -> bool {
    Command::new("git")
        .args(["cat-file", "-e", rev])
        .current_dir(dir)
        .output()
        .expect("failed to run git")
        .status
        .success()
}
