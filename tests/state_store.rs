// tests/state_store.rs

use std::fs;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use tempfile::TempDir;

use revwatch::state::{GlobalState, RepositoryState, StateStore, STATE_FILE_NAME, STATE_VERSION};
use revwatch::types::ActionStatus;
use revwatch_test_utils::{eventually, init_tracing, with_timeout};

fn read_back(dir: &TempDir) -> GlobalState {
    let data = fs::read(dir.path().join(STATE_FILE_NAME)).unwrap();
    serde_json::from_slice(&data).unwrap()
}

#[test]
fn invalid_json_starts_fresh() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(STATE_FILE_NAME), b"{ not json").unwrap();

    let store = StateStore::open(dir.path()).unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.version, STATE_VERSION);
    assert!(snapshot.repositories.is_empty());
}

#[test]
fn missing_directory_is_created() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a/b/state");
    StateStore::open(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn unwritable_state_dir_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    fs::write(&file, b"x").unwrap();
    assert!(StateStore::open(file.join("state")).is_err());
}

#[test]
fn persisted_file_uses_wire_field_names() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    // No runtime here, so the write goes straight through.
    store.upsert("svc-a", |s| {
        s.current_hash = "abc".to_string();
        s.last_action_status = ActionStatus::Failure;
        s.last_error = "boom".to_string();
    });

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join(STATE_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(raw["version"], "1.0");
    assert!(raw["last_updated"].is_string());
    let repo = &raw["repositories"]["svc-a"];
    assert_eq!(repo["name"], "svc-a");
    assert_eq!(repo["current_hash"], "abc");
    assert_eq!(repo["last_action_status"], "failure");
    assert_eq!(repo["last_error"], "boom");
}

#[test]
fn unset_status_is_an_empty_string() {
    let json = r#"{
        "version": "1.0",
        "last_updated": "2024-05-01T12:00:00Z",
        "repositories": {
            "svc-a": { "name": "svc-a", "current_hash": "A", "last_action_status": "" }
        }
    }"#;
    let state: GlobalState = serde_json::from_str(json).unwrap();
    let repo = state.repository("svc-a").unwrap();
    assert_eq!(repo.last_action_status, ActionStatus::Unset);
    assert!(repo.last_fetch.is_none());
    assert!(repo.has_watermark());
}

#[test]
fn reopen_sees_previous_state() {
    let dir = TempDir::new().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.upsert("svc-a", |s| s.current_hash = "A".to_string());
        store.close().unwrap();
    }
    let store = StateStore::open(dir.path()).unwrap();
    assert_eq!(store.get("svc-a").unwrap().current_hash, "A");
}

#[test]
fn updates_preserve_unrelated_fields() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.upsert("svc-a", |s| {
        s.last_action_status = ActionStatus::Success;
    });
    let after = store.upsert("svc-a", |s| s.current_hash = "B".to_string());
    assert_eq!(after.last_action_status, ActionStatus::Success);
    assert_eq!(after.current_hash, "B");
    assert_eq!(after.name, "svc-a");
}

#[tokio::test]
async fn debounced_writes_coalesce() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = StateStore::open_with_debounce(dir.path(), Duration::from_millis(100)).unwrap();
    let path = dir.path().join(STATE_FILE_NAME);

    for i in 0..5 {
        store.upsert("svc-a", |s| s.current_hash = format!("c{i}"));
    }
    assert!(!path.exists(), "write should wait for the debounce");

    with_timeout(eventually(|| path.exists())).await;
    assert_eq!(read_back(&dir).repository("svc-a").unwrap().current_hash, "c4");
}

#[tokio::test(flavor = "current_thread")]
async fn debounced_write_lands_on_a_single_threaded_runtime() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = StateStore::open_with_debounce(dir.path(), Duration::from_millis(20)).unwrap();
    let path = dir.path().join(STATE_FILE_NAME);

    store.upsert("svc-a", |s| s.current_hash = "A".to_string());
    with_timeout(eventually(|| path.exists())).await;

    // A later update scheduled while the first write may still be in flight wins.
    store.upsert("svc-a", |s| s.current_hash = "B".to_string());
    with_timeout(eventually(|| {
        fs::read(&path)
            .ok()
            .and_then(|data| serde_json::from_slice::<GlobalState>(&data).ok())
            .and_then(|state| state.repository("svc-a").map(|r| r.current_hash.clone()))
            .as_deref()
            == Some("B")
    }))
    .await;
}

#[tokio::test]
async fn close_flushes_pending_write() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = StateStore::open_with_debounce(dir.path(), Duration::from_secs(3600)).unwrap();

    store.upsert("svc-a", |s| s.current_hash = "final".to_string());
    store.close().unwrap();

    assert_eq!(read_back(&dir).repository("svc-a").unwrap().current_hash, "final");
    // Closing twice is fine.
    store.close().unwrap();
}

fn repo_state() -> impl Strategy<Value = RepositoryState> {
    (
        "[a-z][a-z0-9-]{0,12}",
        "[0-9a-f]{0,40}",
        prop::option::of(0i64..4_000_000_000),
        prop::option::of(0i64..4_000_000_000),
        prop_oneof![
            Just(ActionStatus::Unset),
            Just(ActionStatus::Success),
            Just(ActionStatus::Failure)
        ],
        ".{0,40}",
    )
        .prop_map(|(name, hash, fetched, executed, status, error)| RepositoryState {
            name,
            last_fetch: fetched.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            current_hash: hash,
            last_action_executed: executed.and_then(|t| Utc.timestamp_opt(t, 0).single()),
            last_action_status: status,
            last_error: error,
        })
}

proptest! {
    #[test]
    fn state_survives_a_disk_round_trip(repos in prop::collection::vec(repo_state(), 0..6)) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        for repo in &repos {
            let wanted = repo.clone();
            store.upsert(&repo.name, move |s| *s = wanted);
        }
        store.close().unwrap();

        let written = store.snapshot();
        let reopened = StateStore::open(dir.path()).unwrap().snapshot();
        prop_assert_eq!(reopened, written);
    }
}
