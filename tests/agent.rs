// tests/agent.rs

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use revwatch::config::{ConfigFile, ConfigProvider};
use revwatch::engine::{ControlLoopOptions, ControlSignal, ReloadDiff};
use revwatch::poll::PollerPhase;
use revwatch::state::{GlobalState, StateStore, STATE_FILE_NAME};
use revwatch::supervisor::{Agent, AgentOptions};
use revwatch::types::ActionStatus;
use revwatch::watch::ChangeDetector;
use revwatch_test_utils::builders::{ConfigFileBuilder, RepositoryBuilder};
use revwatch_test_utils::fake_runner::RecordingRunner;
use revwatch_test_utils::fake_vcs::FakeVcs;
use revwatch_test_utils::{eventually, init_tracing, with_timeout};

fn two_repos(dir: &TempDir) -> ConfigFile {
    ConfigFileBuilder::new()
        .rooted_at(dir.path())
        .with_repository(RepositoryBuilder::new("svc-a").watch("src/").poll_interval("1h").build())
        .with_repository(RepositoryBuilder::new("svc-b").watch("k8s/*").poll_interval("1h").build())
        .build()
}

fn options() -> AgentOptions {
    AgentOptions {
        control: ControlLoopOptions {
            maintenance_interval: Duration::from_secs(3600),
            action_timeout_margin: Duration::from_millis(50),
        },
        shutdown_grace: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn changes_flow_from_pollers_to_actions_and_state() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cfg = two_repos(&dir);
    let state_dir = cfg.agent().state_dir.clone();
    let store = StateStore::open_with_debounce(&state_dir, Duration::from_secs(3600)).unwrap();

    let vcs = FakeVcs::new();
    vcs.set_head("svc-a", "A1");
    vcs.set_head("svc-b", "B1");
    let runner = RecordingRunner::succeeding();

    let agent = Agent::new(
        ConfigProvider::from_config(cfg),
        store.clone(),
        ChangeDetector::new(Arc::new(vcs.clone())),
        runner.clone(),
        options(),
    );
    let handle = agent.handle();
    let join = tokio::spawn(agent.start());

    // Startup checks see both repositories for the first time.
    with_timeout(eventually(|| runner.count() == 2)).await;
    with_timeout(eventually(|| {
        ["svc-a", "svc-b"].iter().all(|n| {
            store
                .get(n)
                .is_some_and(|s| s.last_action_status == ActionStatus::Success)
        })
    }))
    .await;
    assert_eq!(handle.registry().len(), 2);

    // A new commit touching a watched path, picked up by a forced check.
    vcs.set_head("svc-a", "A2");
    vcs.set_diff("svc-a", "A1", "A2", &["src/app.go", "README.md"]);
    assert!(handle.signal(ControlSignal::ForceCheckAll).await);
    with_timeout(eventually(|| runner.count() == 3)).await;

    let last = runner.requests().pop().unwrap();
    assert_eq!(last.repository, "svc-a");
    assert_eq!(last.files, vec!["src/app.go"]);
    assert_eq!(last.old_hash, "A1");
    assert_eq!(last.new_hash, "A2");

    handle.stop();
    handle.stop();
    with_timeout(join).await.unwrap().unwrap();

    let control = handle.registry().get("svc-a");
    assert!(control.is_none(), "pollers are deregistered after shutdown");

    // close() flushed despite the long debounce.
    let data = std::fs::read(state_dir.join(STATE_FILE_NAME)).unwrap();
    let persisted: GlobalState = serde_json::from_slice(&data).unwrap();
    assert_eq!(persisted.repository("svc-a").unwrap().current_hash, "A2");
    assert_eq!(persisted.repository("svc-b").unwrap().current_hash, "B1");
}

#[tokio::test]
async fn shutdown_signal_stops_pollers_and_agent() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cfg = two_repos(&dir);
    let store = StateStore::open(&cfg.agent().state_dir).unwrap();

    let vcs = FakeVcs::new();
    vcs.set_head("svc-a", "A1");
    vcs.set_head("svc-b", "B1");

    let agent = Agent::new(
        ConfigProvider::from_config(cfg),
        store,
        ChangeDetector::new(Arc::new(vcs.clone())),
        RecordingRunner::succeeding(),
        options(),
    );
    let handle = agent.handle();
    let join = tokio::spawn(agent.start());

    with_timeout(eventually(|| vcs.resolves("svc-a") == 1 && vcs.resolves("svc-b") == 1)).await;
    let controls = handle.registry().snapshot();
    assert_eq!(controls.len(), 2);

    assert!(handle.signal(ControlSignal::Shutdown).await);
    with_timeout(join).await.unwrap().unwrap();
    assert!(controls.iter().all(|c| c.phase() == PollerPhase::Stopped));
}

#[tokio::test]
async fn shutdown_is_not_held_up_by_a_stuck_remote() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let cfg = two_repos(&dir);
    let store = StateStore::open(&cfg.agent().state_dir).unwrap();

    let vcs = FakeVcs::new();
    vcs.set_head("svc-a", "A1");
    vcs.set_head("svc-b", "B1");
    vcs.set_resolve_delay(Duration::from_secs(600));

    let agent = Agent::new(
        ConfigProvider::from_config(cfg),
        store,
        ChangeDetector::new(Arc::new(vcs)),
        RecordingRunner::succeeding(),
        options(),
    );
    let handle = agent.handle();
    let join = tokio::spawn(agent.start());

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop();
    with_timeout(join).await.unwrap().unwrap();
}

#[test]
fn reload_diff_reports_added_and_removed() {
    let dir = TempDir::new().unwrap();
    let cfg = ConfigFileBuilder::new()
        .rooted_at(dir.path())
        .with_repository(RepositoryBuilder::new("svc-a").watch("src/").build())
        .with_repository(RepositoryBuilder::new("svc-c").watch("src/").build())
        .build();

    let diff = ReloadDiff::between(["svc-a", "svc-b"], &cfg);
    assert_eq!(diff.added, vec!["svc-c"]);
    assert_eq!(diff.removed, vec!["svc-b"]);
    assert!(ReloadDiff::between(["svc-a", "svc-c"], &cfg).is_empty());
}
