//! End-to-end deletion sagas against an in-memory DHT and disk.

mod support;

use std::path::Path;
use std::sync::Arc;

use common::crypto::UserCredentials;
use common::dht::{DhtError, DhtPort};
use common::testkit::TestEnv;

use process::delete;
use process::engine::{ProcessError, StepError};
use process::notify::{ChannelNotifier, NoopNotifier, TreeEventKind};
use process::steps::ProfileContext;

use support::MemoryFileManager;

#[tokio::test]
async fn test_delete_file_removes_chunks_meta_and_node() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let file = env.seed_file("/docs/a.txt", &[b"h1", b"h2"]).await.unwrap();
    let version_before = env.load_profile().await.unwrap().version();

    let files = MemoryFileManager::new();
    files.seed_file("/docs/a.txt", b"h1h2");

    let (notifier, events) = ChannelNotifier::unbounded();
    let process = delete::from_path(
        "/docs/a.txt",
        Arc::new(files.clone()),
        Arc::new(env.dht.clone()),
        Arc::new(notifier),
        env.credentials.clone(),
    )
    .await
    .unwrap();
    let ctx = process.start().await.unwrap();

    // all DHT residue of the file is gone
    for key in &file.chunk_keys {
        assert!(!env.dht.contains(key), "chunk survived deletion");
    }
    assert!(!env.dht.contains(&file.meta_key), "meta file survived");

    // the committed profile no longer knows the file, but keeps the folder
    let profile = env.load_profile().await.unwrap();
    assert!(profile.tree().resolve(Path::new("/docs/a.txt")).is_none());
    assert!(profile.tree().resolve(Path::new("/docs")).is_some());
    assert_eq!(profile.version(), version_before + 1);

    // local bytes and peers
    assert!(files.contents("/docs/a.txt").is_none());
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, TreeEventKind::Deleted);
    assert_eq!(event.node_id, file.node_id);
    assert_eq!(ctx.deleted_node().unwrap().id(), file.node_id);
}

#[tokio::test]
async fn test_delete_folder_commits_without_touching_content() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_folder("/docs").await.unwrap();
    let other = env.seed_file("/keep.txt", &[b"bytes"]).await.unwrap();

    let files = MemoryFileManager::new();
    files.seed_dir("/docs");

    let process = delete::from_path(
        "/docs",
        Arc::new(files),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .unwrap();
    process.start().await.unwrap();

    let profile = env.load_profile().await.unwrap();
    assert!(profile.tree().resolve(Path::new("/docs")).is_none());
    // unrelated content untouched
    assert!(env.dht.contains(&other.meta_key));
    for key in &other.chunk_keys {
        assert!(env.dht.contains(key));
    }
}

#[tokio::test]
async fn test_nonempty_folder_fails_before_any_network_call() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_folder("/docs").await.unwrap();
    let counts_before = env.dht.op_counts();

    let files = MemoryFileManager::new();
    files.seed_dir("/docs");
    files.seed_file("/docs/a.txt", b"still here");

    let err = delete::from_path(
        "/docs",
        Arc::new(files.clone()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(err, ProcessError::InvalidArgument(_)));
    assert_eq!(env.dht.op_counts(), counts_before);
    assert!(files.contents("/docs/a.txt").is_some());
}

#[tokio::test]
async fn test_missing_target_fails_construction() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();

    let err = delete::from_path(
        "/nowhere.txt",
        Arc::new(MemoryFileManager::new()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(err, ProcessError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_injected_profile_skips_the_fetch() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let file = env.seed_file("/docs/a.txt", &[b"h1"]).await.unwrap();

    let profile = env.load_profile().await.unwrap();
    let block = env.dht.get(&env.profile_key()).await.unwrap();
    let node = profile
        .tree()
        .resolve(Path::new("/docs/a.txt"))
        .unwrap()
        .clone();
    // the setup fetches above count too; only the saga's delta matters
    let profile_gets_before = env.dht.gets_for(&env.profile_key());

    let mut process = delete::from_node(
        &node,
        Arc::new(MemoryFileManager::new()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .unwrap();
    process.context_mut().set_user_profile(profile);
    process.context_mut().set_profile_block(block);
    process.start().await.unwrap();

    // neither the fetch step nor the commit snapshot asked the network
    assert_eq!(env.dht.gets_for(&env.profile_key()), profile_gets_before);
    assert!(!env.dht.contains(&file.meta_key));
    let committed = env.load_profile().await.unwrap();
    assert!(committed.tree().resolve(Path::new("/docs/a.txt")).is_none());
}

#[tokio::test]
async fn test_deleting_unknown_node_rolls_back_and_restores_disk() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_folder("/docs").await.unwrap();

    // the local file exists, the tree never heard of it
    let files = MemoryFileManager::new();
    files.seed_file("/docs/ghost.txt", b"boo");

    let err = delete::from_path(
        "/docs/ghost.txt",
        Arc::new(files.clone()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .unwrap()
    .start()
    .await
    .err()
    .unwrap();

    match err {
        ProcessError::RolledBack { step, reason } => {
            assert_eq!(step, "resolve-meta-file");
            assert!(matches!(reason, StepError::NotFound(_)));
        }
        other => panic!("expected RolledBack, got {other:?}"),
    }
    // disk compensation put the bytes back
    assert_eq!(files.contents("/docs/ghost.txt").unwrap(), "boo");
}

#[tokio::test]
async fn test_meta_remove_failure_restores_chunks_and_profile() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let file = env.seed_file("/docs/a.txt", &[b"h1", b"h2"]).await.unwrap();
    let version_before = env.load_profile().await.unwrap().version();
    let keys_before = env.dht.keys();

    let files = MemoryFileManager::new();
    files.seed_file("/docs/a.txt", b"h1h2");

    env.dht.fail_next_remove(file.meta_key, DhtError::Timeout);

    let err = delete::from_path(
        "/docs/a.txt",
        Arc::new(files.clone()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .unwrap()
    .start()
    .await
    .err()
    .unwrap();

    match err {
        ProcessError::RolledBack { step, reason } => {
            assert_eq!(step, "delete-meta-file");
            assert!(matches!(reason, StepError::Network(DhtError::Timeout)));
        }
        other => panic!("expected RolledBack, got {other:?}"),
    }

    // every removed chunk was re-put and the profile was never committed
    assert_eq!(env.dht.keys(), keys_before);
    let profile = env.load_profile().await.unwrap();
    assert_eq!(profile.version(), version_before);
    assert!(profile.tree().resolve(Path::new("/docs/a.txt")).is_some());
    assert_eq!(files.contents("/docs/a.txt").unwrap(), "h1h2");
}

#[tokio::test]
async fn test_commit_failure_rolls_the_whole_chain_back() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_file("/docs/a.txt", &[b"h1"]).await.unwrap();
    let keys_before = env.dht.keys();

    let files = MemoryFileManager::new();
    files.seed_file("/docs/a.txt", b"h1");

    env.dht
        .fail_next_put(env.profile_key(), DhtError::Unreachable);

    let err = delete::from_path(
        "/docs/a.txt",
        Arc::new(files.clone()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .await
    .unwrap()
    .start()
    .await
    .err()
    .unwrap();

    assert!(matches!(err, ProcessError::RolledBack { .. }));
    assert!(!err.is_fatal());
    assert_eq!(env.dht.keys(), keys_before);
    assert_eq!(files.contents("/docs/a.txt").unwrap(), "h1");
}

#[tokio::test]
async fn test_user_without_write_access_is_denied() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_file("/docs/a.txt", &[b"h1"]).await.unwrap();
    let keys_before = env.dht.keys();

    let profile = env.load_profile().await.unwrap();
    let node = profile
        .tree()
        .resolve(Path::new("/docs/a.txt"))
        .unwrap()
        .clone();

    // bob knows alice's tree but is not listed as a writer on the node
    let bob = UserCredentials::new("bob", "hunter2", "0000");
    let mut process = delete::from_node(
        &node,
        Arc::new(MemoryFileManager::new()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        bob,
    )
    .unwrap();
    process.context_mut().set_user_profile(profile);
    let err = process.start().await.err().unwrap();

    match err {
        ProcessError::RolledBack { step, reason } => {
            assert_eq!(step, "resolve-meta-file");
            assert!(matches!(reason, StepError::PermissionDenied(_)));
        }
        other => panic!("expected RolledBack, got {other:?}"),
    }
    // denied before any mutation was attempted
    assert_eq!(env.dht.keys(), keys_before);
}

#[tokio::test]
async fn test_second_delete_of_the_same_node_rolls_back() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_file("/docs/a.txt", &[b"h1", b"h2"]).await.unwrap();
    let profile = env.load_profile().await.unwrap();
    let node = profile
        .tree()
        .resolve(Path::new("/docs/a.txt"))
        .unwrap()
        .clone();

    delete::from_node(
        &node,
        Arc::new(MemoryFileManager::new()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .unwrap()
    .start()
    .await
    .unwrap();
    let keys_after_first = env.dht.keys();

    // the node is gone from the committed tree; running the same deletion
    // again must fail cleanly without disturbing anything
    let err = delete::from_node(
        &node,
        Arc::new(MemoryFileManager::new()),
        Arc::new(env.dht.clone()),
        Arc::new(NoopNotifier),
        env.credentials.clone(),
    )
    .unwrap()
    .start()
    .await
    .err()
    .unwrap();

    match err {
        ProcessError::RolledBack { step, reason } => {
            assert_eq!(step, "resolve-meta-file");
            assert!(matches!(reason, StepError::NotFound(_)));
        }
        other => panic!("expected RolledBack, got {other:?}"),
    }
    assert_eq!(env.dht.keys(), keys_after_first);
}
