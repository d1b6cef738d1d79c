use camino::Utf8Path;
use dpaper::matcher;
use dpaper::reconcile::Outcome;
use dpaper::transfer::DeleteScope;
use dpaper::tree::RemoteTreeIndex;
use dpaper::{compare_mtime, pairs, Error, SyncPolicy};
use tokio_util::sync::CancellationToken;

use crate::dataset::{Dataset, Entry};
use crate::harness;

fn token() -> CancellationToken {
    CancellationToken::new()
}

#[tokio::test]
async fn skip_transfers_one_sided_entries_only() {
    let h = harness(Dataset::default()).await;
    let summary = h.sync(SyncPolicy::Skip).await;

    // one-sided entries move regardless of policy
    assert!(h.remote.has_doc("only-local.pdf"));
    assert!(h.remote.has_doc("only-local/deep/b.pdf"));
    assert!(h.remote.has_doc("shared/local-only.pdf"));
    assert!(h.has_local_file("only-remote.pdf"));
    assert!(h.has_local_file("only-remote/c.pdf"));
    assert!(h.has_local_file("shared/remote-only.pdf"));

    // entries present on both sides keep their own content
    assert_eq!(
        h.remote.doc_content("newer-local.pdf").unwrap(),
        "newer-local.pdf - remote"
    );
    assert_eq!(
        h.local_content("newer-local.pdf").await.unwrap(),
        "newer-local.pdf - local"
    );
    assert!(summary.transferred() > 0);
}

#[tokio::test]
async fn local_wins_pushes_both_conflicts() {
    let h = harness(Dataset::default()).await;
    h.sync(SyncPolicy::LocalWins).await;

    assert_eq!(
        h.remote.doc_content("newer-local.pdf").unwrap(),
        "newer-local.pdf - local"
    );
    assert_eq!(
        h.remote.doc_content("newer-remote.pdf").unwrap(),
        "newer-remote.pdf - local"
    );
    // local files are never touched under local_wins
    assert_eq!(
        h.local_content("newer-remote.pdf").await.unwrap(),
        "newer-remote.pdf - local"
    );
}

#[tokio::test]
async fn remote_wins_pulls_both_conflicts() {
    let h = harness(Dataset::default()).await;
    h.sync(SyncPolicy::RemoteWins).await;

    assert_eq!(
        h.local_content("newer-local.pdf").await.unwrap(),
        "newer-local.pdf - remote"
    );
    assert_eq!(
        h.local_content("newer-remote.pdf").await.unwrap(),
        "newer-remote.pdf - remote"
    );
    assert_eq!(
        h.remote.doc_content("newer-local.pdf").unwrap(),
        "newer-local.pdf - remote"
    );
}

#[tokio::test]
async fn newer_moves_each_conflict_toward_the_newer_side() {
    let h = harness(Dataset::default()).await;
    h.sync(SyncPolicy::Newer).await;

    assert_eq!(
        h.remote.doc_content("newer-local.pdf").unwrap(),
        "newer-local.pdf - local"
    );
    assert_eq!(
        h.local_content("newer-remote.pdf").await.unwrap(),
        "newer-remote.pdf - remote"
    );
    // same age within tolerance, neither side moves
    assert_eq!(h.remote.doc_content("both-same.pdf").unwrap(), "both-same.pdf");
}

#[tokio::test]
async fn newer_sync_is_idempotent() {
    let h = harness(Dataset::default()).await;
    h.sync(SyncPolicy::Newer).await;
    let again = h.sync(SyncPolicy::Newer).await;

    assert_eq!(again.transferred(), 0, "second run should move nothing");
}

#[tokio::test]
async fn kind_clash_is_reported_and_left_alone() {
    let h = harness(Dataset::default()).await;
    let summary = h.sync(SyncPolicy::LocalWins).await;

    assert!(summary
        .results
        .iter()
        .any(|(path, outcome)| path == "clash" && *outcome == Outcome::TypeMismatch));
    // a conflict is reported, it is not a failure
    assert_eq!(summary.conflicts(), 1);
    assert!(summary.is_clean());
    assert_eq!(h.local_content("clash").await.unwrap(), "clash - local file");
    assert!(h.remote.has_folder("clash"));
}

#[tokio::test]
async fn empty_sides_have_nothing_to_do() {
    let h = harness(Dataset::empty()).await;
    let summary = h.sync(SyncPolicy::Newer).await;

    assert_eq!(summary.transferred(), 0);
    assert!(summary.is_clean());
    assert_eq!(summary.to_string(), "nothing to do, both sides agree");
}

#[tokio::test]
async fn upload_creates_missing_parents() {
    let h = harness(Dataset::empty()).await;
    let local = h.local_path("c.pdf");
    tokio::fs::write(&local, "content").await.unwrap();

    h.transfers()
        .upload_file(&local, Utf8Path::new("sub/deep/c.pdf"), SyncPolicy::Skip, &token())
        .await
        .unwrap();

    assert!(h.remote.has_folder("sub"));
    assert!(h.remote.has_folder("sub/deep"));
    assert_eq!(h.remote.doc_content("sub/deep/c.pdf").unwrap(), "content");
}

#[tokio::test]
async fn upload_respects_skip_on_existing_destination() {
    let h = harness(Dataset::default()).await;
    let local = h.local_path("newer-local.pdf");

    let disposition = h
        .transfers()
        .upload_file(&local, Utf8Path::new("newer-local.pdf"), SyncPolicy::Skip, &token())
        .await
        .unwrap();

    assert_eq!(disposition, dpaper::transfer::Disposition::Skipped);
    assert_eq!(
        h.remote.doc_content("newer-local.pdf").unwrap(),
        "newer-local.pdf - remote"
    );
}

#[tokio::test]
async fn upload_to_remote_folder_is_a_kind_clash() {
    let h = harness(Dataset::default()).await;
    let local = h.local_path("only-local.pdf");

    let err = h
        .transfers()
        .upload_file(&local, Utf8Path::new("only-remote"), SyncPolicy::LocalWins, &token())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TypeMismatch(..)));
}

#[tokio::test]
async fn download_stamps_remote_mtime() {
    let h = harness(Dataset::default()).await;
    let local = h.local_path("fetched.pdf");

    h.transfers()
        .download_file(Utf8Path::new("only-remote.pdf"), &local, SyncPolicy::Skip, &token())
        .await
        .unwrap();

    let stamped: chrono::DateTime<chrono::Utc> = std::fs::metadata(&local)
        .unwrap()
        .modified()
        .unwrap()
        .into();
    let remote = h.remote.doc_mtime("only-remote.pdf").unwrap();
    assert_eq!(compare_mtime(stamped, remote), std::cmp::Ordering::Equal);
}

#[rustfmt::skip]
const SCOPED: &[Entry] = &[
    Entry::Dir{name: "folder", entries: &[
        Entry::File{name: "a.pdf", content: "a", age: 3600},
        Entry::File{name: "b.pdf", content: "b", age: 3600},
        Entry::Dir{name: "sub", entries: &[
            Entry::File{name: "c.pdf", content: "c", age: 3600},
        ]},
    ]},
];

#[tokio::test]
async fn delete_single_entry_refuses_non_empty_folder() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    let err = h
        .transfers()
        .delete(Utf8Path::new("folder"), DeleteScope::SingleEntry, &token())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(..)));
    assert!(h.remote.has_folder("folder"));
    assert!(h.remote.has_doc("folder/a.pdf"));
}

#[tokio::test]
async fn delete_single_entry_removes_one_document() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    h.transfers()
        .delete(Utf8Path::new("folder/a.pdf"), DeleteScope::SingleEntry, &token())
        .await
        .unwrap();

    assert!(!h.remote.has_doc("folder/a.pdf"));
    assert!(h.remote.has_doc("folder/b.pdf"));
}

#[tokio::test]
async fn delete_files_only_keeps_subfolders() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    h.transfers()
        .delete(Utf8Path::new("folder"), DeleteScope::FilesOnly, &token())
        .await
        .unwrap();

    assert!(!h.remote.has_doc("folder/a.pdf"));
    assert!(!h.remote.has_doc("folder/b.pdf"));
    assert!(h.remote.has_folder("folder/sub"));
    assert!(h.remote.has_doc("folder/sub/c.pdf"));
}

#[tokio::test]
async fn delete_contents_keeps_the_folder_itself() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    h.transfers()
        .delete(Utf8Path::new("folder"), DeleteScope::ContentsRecursive, &token())
        .await
        .unwrap();

    assert!(h.remote.has_folder("folder"));
    assert_eq!(h.remote.node_count(), 1);
}

#[tokio::test]
async fn delete_full_recursive_removes_everything() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    h.transfers()
        .delete(Utf8Path::new("folder"), DeleteScope::FullRecursive, &token())
        .await
        .unwrap();

    assert_eq!(h.remote.node_count(), 0);
}

#[tokio::test]
async fn delete_missing_entry_is_not_found() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    let err = h
        .transfers()
        .delete(Utf8Path::new("folder/z.pdf"), DeleteScope::SingleEntry, &token())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(..)));
}

#[rustfmt::skip]
const REPORTS: &[Entry] = &[
    Entry::File{name: "Report_v1.pdf", content: "v1", age: 3600},
    Entry::File{name: "Report_v2.pdf", content: "v2", age: 3600},
    Entry::File{name: "Notes.pdf", content: "notes", age: 3600},
];

#[tokio::test]
async fn fragment_delete_acts_on_every_match() {
    let h = harness(Dataset::remote_only(REPORTS)).await;
    let cancel = token();

    let index = RemoteTreeIndex::snapshot(&h.remote, Utf8Path::new(""), &cancel)
        .await
        .unwrap();
    let matches = matcher::resolve_fragment(&index, Utf8Path::new("Report")).unwrap();
    assert_eq!(matches.len(), 2);

    for node in &matches {
        h.transfers()
            .delete(node.path(), DeleteScope::SingleEntry, &cancel)
            .await
            .unwrap();
    }

    assert!(!h.remote.has_doc("Report_v1.pdf"));
    assert!(!h.remote.has_doc("Report_v2.pdf"));
    assert!(h.remote.has_doc("Notes.pdf"));
}

#[tokio::test]
async fn fragment_matches_outlive_the_queried_path() {
    let h = harness(Dataset::remote_only(REPORTS)).await;

    let index = RemoteTreeIndex::snapshot(&h.remote, Utf8Path::new(""), &token())
        .await
        .unwrap();
    let matches = {
        let path = camino::Utf8PathBuf::from("Report");
        matcher::resolve_fragment(&index, &path).unwrap()
    };

    assert_eq!(matches.len(), 2);
}

#[tokio::test]
async fn fragment_without_match_is_not_found() {
    let h = harness(Dataset::remote_only(REPORTS)).await;

    let index = RemoteTreeIndex::snapshot(&h.remote, Utf8Path::new(""), &token())
        .await
        .unwrap();
    let err = matcher::resolve_fragment(&index, Utf8Path::new("Thesis")).unwrap_err();

    assert!(matches!(err, Error::NotFound(..)));
}

#[rustfmt::skip]
const MANY_LOCAL: &[Entry] = &[
    Entry::File{name: "a.pdf", content: "a", age: 3600},
    Entry::File{name: "b.pdf", content: "b", age: 3600},
    Entry::File{name: "c.pdf", content: "c", age: 3600},
    Entry::File{name: "d.pdf", content: "d", age: 3600},
];

#[tokio::test]
async fn cancellation_marks_the_remainder() {
    let h = harness(Dataset::local_only(MANY_LOCAL)).await;
    let cancel = token();
    h.remote.cancel_after_puts(2);

    let summary = h.sync_with(SyncPolicy::Skip, &cancel).await.unwrap();

    assert_eq!(h.remote.put_count(), 2);
    let cancelled = summary
        .results
        .iter()
        .filter(|(_, outcome)| *outcome == Outcome::Cancelled)
        .count();
    assert_eq!(summary.transferred(), 2);
    assert_eq!(cancelled, 2);
    assert!(!summary.is_clean());
}

#[tokio::test]
async fn sync_runs_on_a_spawned_task() {
    let h = harness(Dataset::local_only(MANY_LOCAL)).await;
    let reconciler = h.reconciler.clone();
    let local_root = h.local_root.clone();

    let summary = tokio::spawn(async move {
        reconciler
            .run(&local_root, Utf8Path::new(""), SyncPolicy::Skip, &token())
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.transferred(), 4);
    assert!(h.remote.has_doc("d.pdf"));
}

#[tokio::test]
async fn tree_render_lists_the_hierarchy() {
    let h = harness(Dataset::remote_only(SCOPED)).await;

    let index = RemoteTreeIndex::snapshot(&h.remote, Utf8Path::new(""), &token())
        .await
        .unwrap();
    let rendered = index.render(Utf8Path::new(""), false).unwrap();

    assert_eq!(
        rendered,
        "folder/\n  a.pdf\n  b.pdf\n  sub/\n    c.pdf\n"
    );
}

#[tokio::test]
async fn pair_failure_does_not_stop_the_next_pair() {
    let h = harness(Dataset::local_only(MANY_LOCAL)).await;
    h.remote.insert_folder("dest");

    let list = vec![
        pairs::SyncPair {
            name: "broken".into(),
            local_root: "/nonexistent/dpaper-test".into(),
            remote_root: "".into(),
            policy: SyncPolicy::Skip,
        },
        pairs::SyncPair {
            name: "good".into(),
            local_root: h.local_root.clone(),
            remote_root: "dest".into(),
            policy: SyncPolicy::Skip,
        },
    ];

    let summary = pairs::sync_all(h.remote.clone(), &list, None, &token())
        .await
        .unwrap();

    assert!(matches!(
        summary.outcomes[0].1,
        pairs::PairOutcome::Aborted(..)
    ));
    assert!(matches!(
        summary.outcomes[1].1,
        pairs::PairOutcome::Completed(..)
    ));
    assert!(h.remote.has_doc("dest/a.pdf"));
    assert!(!summary.is_clean());
}

#[tokio::test]
async fn pair_policy_override_applies_to_every_pair() {
    let h = harness(Dataset::default()).await;

    let list = vec![pairs::SyncPair {
        name: "default".into(),
        local_root: h.local_root.clone(),
        remote_root: "".into(),
        policy: SyncPolicy::Skip,
    }];

    pairs::sync_all(h.remote.clone(), &list, Some(SyncPolicy::LocalWins), &token())
        .await
        .unwrap();

    assert_eq!(
        h.remote.doc_content("newer-remote.pdf").unwrap(),
        "newer-remote.pdf - local"
    );
}
