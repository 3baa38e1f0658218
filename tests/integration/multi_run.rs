use notesync::remote::MemoryRemote;
use notesync::store::FsLocalStore;
use notesync::sync::{RefWaitPolicy, SyncOrchestrator};
use notesync::SyncConfig;
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

/// Two workspaces syncing through one remote converge.
#[tokio::test]
async fn two_devices_converge() {
    let laptop = TempDir::new().unwrap();
    let phone = TempDir::new().unwrap();
    std::fs::write(laptop.path().join("todo.md"), "- buy milk").unwrap();

    let config = config();
    let remote = MemoryRemote::new();
    let laptop_store = FsLocalStore::new(laptop.path());
    let phone_store = FsLocalStore::new(phone.path());

    let laptop_sync = SyncOrchestrator::new(&config, &laptop_store, &remote);
    let phone_sync = SyncOrchestrator::new(&config, &phone_store, &remote);

    let first = laptop_sync.sync(None).await;
    assert!(first.success, "{:?}", first.messages);
    let laptop_base = first.base_commit;

    let second = phone_sync.sync(None).await;
    assert!(second.success, "{:?}", second.messages);
    assert_eq!(
        std::fs::read_to_string(phone.path().join("todo.md")).unwrap(),
        "- buy milk"
    );
    assert!(!phone.path().join("README.md").exists());
    let phone_base = second.base_commit;
    assert_eq!(phone_base, laptop_base);

    std::fs::write(phone.path().join("todo.md"), "- buy milk\n- call mom").unwrap();
    let third = phone_sync.sync(phone_base.as_deref()).await;
    assert!(third.success, "{:?}", third.messages);

    let fourth = laptop_sync.sync(laptop_base.as_deref()).await;
    assert!(fourth.success, "{:?}", fourth.messages);
    assert_eq!(
        std::fs::read_to_string(laptop.path().join("todo.md")).unwrap(),
        "- buy milk\n- call mom"
    );
    assert_eq!(fourth.base_commit, third.base_commit);

    let fifth = laptop_sync.sync(fourth.base_commit.as_deref()).await;
    assert_eq!(fifth.messages, vec!["No changes since last sync".to_string()]);
}

/// A pull that succeeds before a failed push is not lost: the next run sees
/// the pulled file as already in sync.
#[tokio::test]
async fn rerun_after_push_failure_is_idempotent() {
    use notesync::error::RemoteError;
    use notesync::remote::memory::RemoteOp;

    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("mine.md"), "local").unwrap();
    let remote = MemoryRemote::new();
    remote.seed_commit("main", &[("theirs.md", b"remote".as_slice())], "seed");

    let config = config();
    let store = FsLocalStore::new(temp.path());
    let orchestrator = SyncOrchestrator::new(&config, &store, &remote);

    remote.fail_on(RemoteOp::CreateTree, RemoteError::network("502"));
    let failed = orchestrator.sync(None).await;
    assert!(!failed.success);
    assert!(temp.path().join("theirs.md").exists());

    remote.clear_failures();
    let retried = orchestrator.sync(failed.base_commit.as_deref()).await;
    assert!(retried.success, "{:?}", retried.messages);
    let diff = retried.diff.unwrap();
    assert!(diff.pull_new.is_empty());
    assert_eq!(diff.push_new, vec!["mine.md".to_string()]);
}
