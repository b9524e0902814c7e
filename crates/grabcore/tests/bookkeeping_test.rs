//! Job bookkeeping against the JSON state file
//!
//! Run with: cargo test -p grabcore --test bookkeeping_test

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use grabcore::delivery::IncomingRequest;
use grabcore::download::source::shared_provider;
use grabcore::download::{InstagramStrategy, YouTubeStrategy};
use grabcore::storage::{BotAggregateState, JobBook, JsonFileStore, StatsStore};
use grabcore::Orchestrator;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn test_crash_recovery_cleans_orphaned_dirs() {
    let root = TempDir::new().unwrap();
    let state_path = root.path().join("bot_state.json");
    let temp_root = root.path().join("jobs");
    let orphan = temp_root.join("yt_42_1700000000_abcdef");
    std::fs::create_dir_all(&orphan).unwrap();
    write_sparse(&orphan.join("partial.mp4.part"), 1000);

    let state = serde_json::json!({
        "downloads_completed": 7,
        "downloads_failed": 2,
        "active_downloads": {
            "42_1700000000_abcdef": {
                "platform": "youtube",
                "url": "https://youtu.be/x",
                "work_dir": orphan,
                "started_at": "2023-11-14T22:13:20Z"
            }
        },
        "user_stats": { "42": { "total": 9, "success": 7 } }
    });
    std::fs::write(&state_path, serde_json::to_string_pretty(&state).unwrap()).unwrap();

    let book = JobBook::new(Arc::new(JsonFileStore::open(&state_path)));
    let recovered = book.recover_crashed(&temp_root).unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].as_str(), "42_1700000000_abcdef");
    assert!(!orphan.exists());

    let reloaded = JsonFileStore::open(&state_path).snapshot();
    assert!(reloaded.active_downloads.is_empty());
    assert!(reloaded.last_restart.is_some());
    assert_eq!(reloaded.downloads_completed, 7);
    assert_eq!(reloaded.user(42).total, 9);
}

#[test]
fn test_recovery_with_nothing_active_only_stamps_restart() {
    let root = TempDir::new().unwrap();
    let state_path = root.path().join("bot_state.json");
    let book = JobBook::new(Arc::new(JsonFileStore::open(&state_path)));

    assert!(book.recover_crashed(root.path()).unwrap().is_empty());
    let reloaded = JsonFileStore::open(&state_path).snapshot();
    assert!(reloaded.last_restart.is_some());
    assert_eq!(reloaded.total_downloads(), 0);
}

#[test]
fn test_sweeps_only_touch_job_dirs() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir(root.path().join("ig_1_1_000001")).unwrap();
    std::fs::create_dir(root.path().join("yt_1_1_000002")).unwrap();
    std::fs::create_dir(root.path().join("cache")).unwrap();
    let book = JobBook::new(Arc::new(grabcore::MemoryStore::new()));

    assert!(book.sweep_stale(root.path(), Duration::from_secs(3600)).unwrap().is_empty());
    assert_eq!(book.sweep_all(root.path()).unwrap().len(), 2);
    assert!(root.path().join("cache").exists());
    assert!(job_dirs(root.path()).is_empty());
}

#[tokio::test]
async fn test_orchestrator_writes_through_to_state_file() {
    let root = TempDir::new().unwrap();
    let state_path = root.path().join("state").join("bot_state.json");
    let settings = test_settings(&root.path().join("jobs"));

    let yt = Arc::new(FakeDownloader::new(vec![
        Script::Files(vec![("a.mp4", MB)], Some("A")),
        Script::Files(vec![("b.mp4", MB)], Some("B")),
    ]));
    let orchestrator = Orchestrator::new(
        InstagramStrategy::new(
            shared_provider(idle_provider()),
            Arc::new(FakeDownloader::new(vec![])),
            &settings,
        ),
        YouTubeStrategy::new(yt, &settings),
        Arc::new(FakeTranscoder::default()),
        JobBook::new(Arc::new(JsonFileStore::open(&state_path))),
        settings,
    );
    let chat = FakeMessenger::new();

    for user in [10, 11] {
        orchestrator
            .handle(&chat, &IncomingRequest::new(user, "https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();
    }

    let on_disk: BotAggregateState = serde_json::from_str(&std::fs::read_to_string(&state_path).unwrap()).unwrap();
    assert_eq!(on_disk.downloads_completed, 2);
    assert_eq!(on_disk.user(10).success, 1);
    assert_eq!(on_disk.user(11).success, 1);
    assert!(on_disk.active_downloads.is_empty());
    assert_eq!(on_disk, orchestrator.jobs().snapshot());
}
