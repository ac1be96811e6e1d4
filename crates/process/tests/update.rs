//! End-to-end new-version sagas against an in-memory DHT and disk.

mod support;

use std::path::Path;
use std::sync::Arc;

use common::block::BlockEncoded;
use common::dht::{DhtError, DhtPort};
use common::model::MetaFile;
use common::testkit::TestEnv;

use process::engine::{ProcessError, StepError};
use process::notify::{ChannelNotifier, NoopNotifier, TreeEventKind};
use process::update;

use support::MemoryFileManager;

#[tokio::test]
async fn test_update_appends_version_and_repoints_node() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let file = env.seed_file("/docs/a.txt", &[b"old"]).await.unwrap();
    let version_before = env.load_profile().await.unwrap().version();

    let files = MemoryFileManager::new();
    files.seed_file("/docs/a.txt", b"new contents");

    let (notifier, events) = ChannelNotifier::unbounded();
    let process = update::from_path(
        "/docs/a.txt",
        Arc::new(files),
        Arc::new(env.dht.clone()),
        Arc::new(notifier),
        env.credentials.clone(),
    )
    .await
    .unwrap();
    let ctx = process.start().await.unwrap();

    let new_meta_key = *ctx.new_meta_key().unwrap();
    assert_ne!(new_meta_key, file.meta_key);

    // the node now points at the extended meta file; the old block is gone
    let profile = env.load_profile().await.unwrap();
    let node = profile.tree().resolve(Path::new("/docs/a.txt")).unwrap();
    assert_eq!(node.id(), file.node_id);
    assert_eq!(node.meta(), Some(&new_meta_key));
    assert_eq!(profile.version(), version_before + 1);
    assert!(!env.dht.contains(&file.meta_key));

    // both versions resolve: history is append-only and old chunks survive
    let meta_block = env.dht.get(&new_meta_key).await.unwrap();
    let meta = MetaFile::decode(&env.secret.decrypt(&meta_block).unwrap()).unwrap();
    assert_eq!(meta.versions().len(), 2);
    assert_eq!(meta.latest().unwrap().index(), 1);
    for key in &file.chunk_keys {
        assert!(env.dht.contains(key), "old version chunk was dropped");
    }
    let new_chunk = env
        .dht
        .get(meta.latest().unwrap().chunks()[0].key())
        .await
        .unwrap();
    assert_eq!(env.secret.decrypt(&new_chunk).unwrap(), b"new contents");

    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, TreeEventKind::Updated);
    assert_eq!(event.node_id, file.node_id);
}

#[tokio::test]
async fn test_update_of_tree_folder_rolls_back_uploads() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    env.seed_folder("/docs").await.unwrap();
    let keys_before = env.dht.keys();

    // a file on disk shadowing a folder in the tree
    let files = MemoryFileManager::new();
    files.seed_file("/docs", b"not actually a folder");

    let err = update::from_path(
        "/docs",
        Arc::new(files),
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
            assert_eq!(step, "put-new-version");
            assert!(matches!(reason, StepError::InvalidArgument(_)));
        }
        other => panic!("expected RolledBack, got {other:?}"),
    }
    assert_eq!(env.dht.keys(), keys_before);
}

#[tokio::test]
async fn test_update_of_unknown_target_rolls_back() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let keys_before = env.dht.keys();

    let files = MemoryFileManager::new();
    files.seed_file("/missing.txt", b"never synced");

    let err = update::from_path(
        "/missing.txt",
        Arc::new(files),
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
    assert_eq!(env.dht.keys(), keys_before);
}

#[tokio::test]
async fn test_update_local_folder_fails_construction() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();

    let files = MemoryFileManager::new();
    files.seed_dir("/docs");

    let err = update::from_path(
        "/docs",
        Arc::new(files),
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
async fn test_update_commit_failure_restores_old_meta_file() {
    support::trace_init();
    let env = TestEnv::new("alice").await.unwrap();
    let file = env.seed_file("/docs/a.txt", &[b"old"]).await.unwrap();
    let keys_before = env.dht.keys();
    let version_before = env.load_profile().await.unwrap().version();

    let files = MemoryFileManager::new();
    files.seed_file("/docs/a.txt", b"new contents");

    env.dht.fail_next_put(env.profile_key(), DhtError::Timeout);

    let err = update::from_path(
        "/docs/a.txt",
        Arc::new(files),
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

    // the superseded meta block is back, the new one and its chunks are gone
    assert_eq!(env.dht.keys(), keys_before);
    let profile = env.load_profile().await.unwrap();
    assert_eq!(profile.version(), version_before);
    let node = profile.tree().resolve(Path::new("/docs/a.txt")).unwrap();
    assert_eq!(node.meta(), Some(&file.meta_key));
}
