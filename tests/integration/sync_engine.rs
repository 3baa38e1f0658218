use notesync::remote::memory::RemoteOp;
use notesync::remote::{MemoryRemote, RemoteRepository};
use notesync::store::FsLocalStore;
use notesync::sync::{RefWaitPolicy, SyncOrchestrator, SyncPhase};
use notesync::config::{sources::WORKSPACE_CONFIG_FILE, ConfigLoader};
use notesync::{compute_blob_id, SyncConfig};
use std::path::Path;
use tempfile::TempDir;

fn config() -> SyncConfig {
    SyncConfig {
        owner: "me".to_string(),
        repository: "notes".to_string(),
        access_token: "token".to_string(),
        ref_wait: RefWaitPolicy {
            initial_delay_ms: 1,
            multiplier: 1.5,
            max_delay_ms: 5,
            timeout_ms: 1_000,
        },
        ..SyncConfig::default()
    }
}

fn write(root: &Path, path: &str, content: &[u8]) {
    let full = root.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
}

#[tokio::test]
async fn first_sync_bootstraps_and_replaces_placeholder() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "daily/2024-01-01.md", b"# day one");
    write(temp.path(), "attachments/scan.pdf", &[0x25, 0x50, 0x44, 0x46, 0x00, 0xc3]);

    let config = config();
    let remote = MemoryRemote::new();
    let store = FsLocalStore::new(temp.path());

    let result = SyncOrchestrator::new(&config, &store, &remote).sync(None).await;

    assert!(result.success, "{:?}", result.messages);
    let diff = result.diff.as_ref().unwrap();
    assert_eq!(diff.push_new.len(), 2);
    assert_eq!(diff.push_delete, vec!["README.md".to_string()]);

    let base = result.base_commit.unwrap();
    assert_eq!(remote.branch_head("main").as_deref(), Some(base.as_str()));
    let files = remote.files_at(&base).unwrap();
    assert!(!files.contains_key("README.md"));
    assert_eq!(
        files.get("attachments/scan.pdf").map(Vec::as_slice),
        Some(&[0x25, 0x50, 0x44, 0x46, 0x00, 0xc3][..])
    );
    assert_eq!(remote.call_count(RemoteOp::CreateInitialCommit), 1);

    // the placeholder commit is the parent of the first real commit
    let parent = remote.commit_parent(&base).unwrap();
    assert_eq!(remote.commit_message(&parent).as_deref(), Some("Initial commit"));
}

#[tokio::test]
async fn remote_ids_match_local_hashes_after_push() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.md", b"hello");

    let config = config();
    let remote = MemoryRemote::new();
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote).sync(None).await;
    let base = result.base_commit.unwrap();

    let tree = remote.commit_tree(&base).await.unwrap();
    let listing = remote.list_tree(&tree).await.unwrap();
    let entry = listing.iter().find(|e| e.path == "a.md").unwrap();
    assert_eq!(entry.sha.as_deref(), Some(compute_blob_id(b"hello").as_str()));
    assert_eq!(compute_blob_id(b"hello"), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
}

#[tokio::test]
async fn workspace_config_with_token_is_never_pushed() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        WORKSPACE_CONFIG_FILE,
        b"owner = \"me\"\nrepository = \"notes\"\naccess_token = \"ghp_secret\"\n",
    );
    write(temp.path(), "note.md", b"n");

    let loaded = ConfigLoader::load(temp.path()).unwrap();
    let config = SyncConfig {
        ref_wait: config().ref_wait,
        ..loaded
    };
    let remote = MemoryRemote::new();
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote).sync(None).await;

    assert!(result.success, "{:?}", result.messages);
    let files = remote.files_at(&result.base_commit.unwrap()).unwrap();
    assert!(files.contains_key("note.md"));
    assert!(!files.contains_key(WORKSPACE_CONFIG_FILE));
    assert!(files.values().all(|bytes| !bytes.windows(10).any(|w| w == b"ghp_secret")));
    assert!(temp.path().join(WORKSPACE_CONFIG_FILE).exists());
}

#[tokio::test]
async fn conflicting_edits_abort_before_any_write() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "plan.md", b"mine");
    write(temp.path(), "other.md", b"unchanged");

    let remote = MemoryRemote::new();
    let base = remote.seed_commit(
        "main",
        &[("plan.md", b"v1".as_slice()), ("other.md", b"unchanged".as_slice())],
        "base",
    );
    remote.seed_commit(
        "main",
        &[
            ("plan.md", b"theirs".as_slice()),
            ("other.md", b"unchanged".as_slice()),
            ("new.md", b"remote only".as_slice()),
        ],
        "theirs",
    );

    let config = config();
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote)
        .sync(Some(&base))
        .await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(SyncPhase::Conflict));
    assert_eq!(
        result.messages,
        vec![
            "Sync Aborted: Conflicts detected".to_string(),
            "Please check CONFLICTS.md for more info".to_string()
        ]
    );
    assert_eq!(result.base_commit.as_deref(), Some(base.as_str()));
    // the pull of new.md is not applied while a conflict is pending
    assert!(!temp.path().join("new.md").exists());
    let report = std::fs::read_to_string(temp.path().join("CONFLICTS.md")).unwrap();
    assert!(report.starts_with("## Conflicts"));
    assert!(report.contains("- [ ] plan.md"));
}

#[tokio::test]
async fn remote_deletion_and_local_deletion_both_apply() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "keep.md", b"keep");
    write(temp.path(), "remote-deleted.md", b"x");
    // local-deleted.md was removed locally

    let remote = MemoryRemote::new();
    let base = remote.seed_commit(
        "main",
        &[
            ("keep.md", b"keep".as_slice()),
            ("remote-deleted.md", b"x".as_slice()),
            ("local-deleted.md", b"y".as_slice()),
        ],
        "base",
    );
    let head = remote.seed_commit(
        "main",
        &[("keep.md", b"keep".as_slice()), ("local-deleted.md", b"y".as_slice())],
        "remove on remote",
    );

    let config = config();
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote)
        .sync(Some(&base))
        .await;

    assert!(result.success, "{:?}", result.messages);
    assert!(!temp.path().join("remote-deleted.md").exists());
    let new_base = result.base_commit.unwrap();
    assert_eq!(remote.commit_parent(&new_base), Some(head));
    let files = remote.files_at(&new_base).unwrap();
    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["keep.md"]);
}

#[tokio::test]
async fn slow_ref_propagation_still_succeeds() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.md", b"local");

    let remote = MemoryRemote::new();
    remote.seed_commit("main", &[("b.md", b"remote".as_slice())], "seed");
    remote.set_ref_lag(4);

    let config = config();
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote).sync(None).await;

    assert!(result.success, "{:?}", result.messages);
    assert_eq!(remote.call_count(RemoteOp::UpdateRef), 1);
    assert!(remote.call_count(RemoteOp::HeadCommit) >= 5);
}

#[tokio::test]
async fn ref_that_never_propagates_fails_push() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.md", b"local");

    let remote = MemoryRemote::new();
    remote.seed_commit("main", &[("b.md", b"remote".as_slice())], "seed");
    remote.set_ref_lag(usize::MAX);

    let mut config = config();
    config.ref_wait.timeout_ms = 30;
    let store = FsLocalStore::new(temp.path());
    let result = SyncOrchestrator::new(&config, &store, &remote).sync(None).await;

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(SyncPhase::Push));
    assert_eq!(result.base_commit, None);
    assert_eq!(remote.call_count(RemoteOp::UpdateRef), 1);
}
