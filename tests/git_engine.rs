//! End-to-end write path against a real repository through [`GitEngine`].

mod common;

use std::path::Path;
use std::sync::Barrier;

use gitdoc::{DocError, Document, DocumentDraft, GitEngine, Orchestrator};
use serde_json::json;

use common::{alice, git, git_exists, setup_repo, test_identity};

fn store(repo: &Path) -> Orchestrator<GitEngine> {
    Orchestrator::new(GitEngine::new(), repo).with_identity(test_identity())
}

fn create(orch: &Orchestrator<GitEngine>, id: &str, attributes: serde_json::Value) -> Document {
    orch.create(
        "main",
        &alice(),
        "widget",
        DocumentDraft::new("widget", attributes).with_id(id),
    )
    .unwrap()
}

fn update(
    orch: &Orchestrator<GitEngine>,
    id: &str,
    version: &str,
    attributes: serde_json::Value,
) -> Result<Document, DocError> {
    orch.update(
        "main",
        &alice(),
        "widget",
        id,
        DocumentDraft::new("widget", attributes)
            .with_id(id)
            .with_version(version),
    )
}

fn stored(repo: &Path, id: &str) -> serde_json::Value {
    let raw = git(repo, &["show", &format!("refs/heads/main:contents/widget/{id}.json")]);
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn create_then_update_round_trip() {
    let dir = setup_repo();
    let orch = store(dir.path());

    let created = orch
        .create(
            "main",
            &alice(),
            "widget",
            DocumentDraft::new("widget", json!({"a": 1})),
        )
        .unwrap();
    assert_eq!(created.id.len(), 40);
    assert_eq!(git(dir.path(), &["rev-parse", "refs/heads/main"]), created.meta.version);
    assert_eq!(stored(dir.path(), &created.id), json!({"a": 1}));

    let updated = update(&orch, &created.id, &created.meta.version, json!({"a": 2})).unwrap();
    assert_eq!(updated.attributes, json!({"a": 2}));
    assert_ne!(updated.meta.version, created.meta.version);
    assert_eq!(git(dir.path(), &["rev-parse", "refs/heads/main"]), updated.meta.version);
    assert_eq!(
        git(dir.path(), &["rev-parse", &format!("{}^", updated.meta.version)]),
        created.meta.version
    );
    assert_eq!(stored(dir.path(), &created.id), json!({"a": 2}));
}

#[test]
fn commits_record_author_committer_and_message() {
    let dir = setup_repo();
    let orch = store(dir.path());
    create(&orch, "0123456789abcdef", json!({}));

    let line = git(dir.path(), &["log", "-1", "--format=%an|%ae|%cn|%ce|%s", "refs/heads/main"]);
    assert_eq!(
        line,
        "Alice|alice@example.com|PID1 on test-host|svc@test-host|create widget 89abcdef"
    );
}

#[test]
fn delete_then_update_is_not_found() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let created = create(&orch, "abc", json!({"a": 1}));
    let updated = update(&orch, "abc", &created.meta.version, json!({"a": 2})).unwrap();

    orch.delete(
        "main",
        &alice(),
        Some(&updated.meta.version),
        "widget",
        Some("abc"),
    )
    .unwrap();
    assert!(!git_exists(dir.path(), "refs/heads/main:contents/widget/abc.json"));

    for version in [&created.meta.version, &updated.meta.version] {
        let err = update(&orch, "abc", version, json!({"a": 3})).unwrap_err();
        assert!(matches!(err, DocError::NotFound { .. }), "{err}");
        assert_eq!(err.status(), 404);
    }

    let err = orch
        .delete("main", &alice(), None, "widget", Some("abc"))
        .unwrap_err();
    assert!(matches!(err, DocError::NotFound { .. }), "{err}");
}

#[test]
fn supplied_id_taken_is_rejected() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let first = create(&orch, "abc", json!({"a": 1}));

    let err = orch
        .create(
            "main",
            &alice(),
            "widget",
            DocumentDraft::new("widget", json!({"a": 9})).with_id("abc"),
        )
        .unwrap_err();
    assert!(matches!(err, DocError::IdAlreadyInUse { .. }), "{err}");
    assert_eq!(git(dir.path(), &["rev-parse", "refs/heads/main"]), first.meta.version);
    assert_eq!(stored(dir.path(), "abc"), json!({"a": 1}));
}

#[test]
fn same_id_under_another_type_is_a_different_document() {
    let dir = setup_repo();
    let orch = store(dir.path());
    create(&orch, "abc", json!({}));
    orch.create(
        "main",
        &alice(),
        "gadget",
        DocumentDraft::new("gadget", json!({})).with_id("abc"),
    )
    .unwrap();
    assert!(git_exists(dir.path(), "refs/heads/main:contents/gadget/abc.json"));
}

#[test]
fn stale_version_conflicts() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let v1 = create(&orch, "abc", json!({"a": 1})).meta.version;
    let v2 = update(&orch, "abc", &v1, json!({"a": 2})).unwrap().meta.version;

    let err = update(&orch, "abc", &v1, json!({"a": 3})).unwrap_err();
    assert!(matches!(err, DocError::MergeConflict { .. }), "{err}");
    assert!(err.is_retryable());

    let err = orch
        .delete("main", &alice(), Some(&v1), "widget", Some("abc"))
        .unwrap_err();
    assert!(matches!(err, DocError::MergeConflict { .. }), "{err}");

    assert_eq!(git(dir.path(), &["rev-parse", "refs/heads/main"]), v2);
    assert_eq!(stored(dir.path(), "abc"), json!({"a": 2}));
}

#[test]
fn changes_to_other_documents_are_merged() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let a = create(&orch, "a", json!({"n": 1}));
    let b = create(&orch, "b", json!({"n": 1}));

    // `a` was last seen before `b` existed; the branch moved but not under `a`.
    let updated = update(&orch, "a", &a.meta.version, json!({"n": 2})).unwrap();
    assert_eq!(
        git(dir.path(), &["rev-parse", &format!("{}^", updated.meta.version)]),
        b.meta.version
    );
    assert_eq!(stored(dir.path(), "a"), json!({"n": 2}));
    assert_eq!(stored(dir.path(), "b"), json!({"n": 1}));
}

#[test]
fn unknown_versions_are_invalid() {
    let dir = setup_repo();
    let orch = store(dir.path());
    create(&orch, "abc", json!({}));

    for version in ["not-a-version", "0000000000000000000000000000000000000001"] {
        let err = update(&orch, "abc", version, json!({})).unwrap_err();
        assert!(matches!(err, DocError::InvalidVersion { .. }), "{version}: {err}");
        assert_eq!(err.status(), 400);
        assert_eq!(err.pointer(), Some("/data/meta/version"));
    }
}

#[test]
fn version_from_another_line_of_history_conflicts() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let on_main = create(&orch, "abc", json!({"a": 1}));

    let other = orch
        .create(
            "draft",
            &alice(),
            "widget",
            DocumentDraft::new("widget", json!({"a": "draft"})).with_id("abc"),
        )
        .unwrap();
    assert_ne!(other.meta.version, on_main.meta.version);

    let err = update(&orch, "abc", &other.meta.version, json!({"a": 2})).unwrap_err();
    assert!(matches!(err, DocError::MergeConflict { .. }), "{err}");
}

#[test]
fn store_is_shareable_between_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Orchestrator<GitEngine>>();
}

#[test]
fn concurrent_creates_all_land() {
    let dir = setup_repo();
    let orch = store(dir.path());

    let ids: Vec<String> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..4)
                        .map(|_| {
                            orch.create(
                                "main",
                                &alice(),
                                "widget",
                                DocumentDraft::new("widget", json!({})),
                            )
                            .unwrap_or_else(|e| panic!("{}: {e}", e.status()))
                            .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers
            .into_iter()
            .flat_map(|w| w.join().unwrap())
            .collect()
    });

    let count = git(dir.path(), &["rev-list", "--count", "refs/heads/main"]);
    assert_eq!(count, "32");
    for id in ids {
        assert!(git_exists(
            dir.path(),
            &format!("refs/heads/main:contents/widget/{id}.json")
        ));
    }
}

#[test]
fn concurrent_updates_from_one_version_have_one_winner() {
    let dir = setup_repo();
    let orch = store(dir.path());
    let base = create(&orch, "abc", json!({"writer": null})).meta.version;
    let start = Barrier::new(8);

    let outcomes: Vec<Result<Document, DocError>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|n| {
                let (orch, start, base) = (&orch, &start, &base);
                s.spawn(move || {
                    start.wait();
                    update(orch, "abc", base, json!({"writer": n}))
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let winners: Vec<&Document> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, DocError::MergeConflict { .. }), "{err}");
        assert_eq!(err.status(), 409);
    }

    assert_eq!(git(dir.path(), &["rev-parse", "refs/heads/main"]), winners[0].meta.version);
    assert_eq!(stored(dir.path(), "abc"), winners[0].attributes);
    assert_eq!(git(dir.path(), &["rev-list", "--count", "refs/heads/main"]), "2");
}
