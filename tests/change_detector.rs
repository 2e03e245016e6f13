// tests/change_detector.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use revwatch::config::WatchSpec;
use revwatch::watch::{ChangeDetector, WatchSet};
use revwatch_test_utils::fake_vcs::FakeVcs;
use revwatch_test_utils::init_tracing;

fn spec(patterns: &[&str]) -> (WatchSpec, WatchSet) {
    let watch_paths: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    let ws = WatchSet::new(&watch_paths).unwrap();
    let spec = WatchSpec {
        name: "svc-a".to_string(),
        url: "https://git.example.com/svc-a.git".to_string(),
        branch: "main".to_string(),
        watch_paths,
        poll_interval: Duration::from_secs(60),
    };
    (spec, ws)
}

const LOCAL: &str = "/tmp/revwatch-cache/svc-a";

#[tokio::test]
async fn resolves_after_clone_and_fetch() {
    init_tracing();
    let vcs = FakeVcs::new();
    vcs.set_head("svc-a", "abc123");
    let detector = ChangeDetector::new(Arc::new(vcs.clone()));
    let (spec, ws) = spec(&["src/"]);

    let detection = detector.detect(Path::new(LOCAL), &spec, &ws, "").await.unwrap();
    assert_eq!(detection.current, "abc123");
    assert_eq!(detection.changed, vec!["src/"]);
    assert_eq!(vcs.clones("svc-a"), 1);
}

#[tokio::test]
async fn fetch_failure_is_an_error() {
    let vcs = FakeVcs::new();
    vcs.set_head("svc-a", "abc123");
    vcs.fail_fetch("svc-a", true);
    let detector = ChangeDetector::new(Arc::new(vcs));
    let (spec, ws) = spec(&["src/"]);

    assert!(detector.detect(Path::new(LOCAL), &spec, &ws, "").await.is_err());
}

#[tokio::test]
async fn equal_commits_have_no_changes() {
    let vcs = FakeVcs::new();
    let detector = ChangeDetector::new(Arc::new(vcs));
    let (_, ws) = spec(&["src/"]);

    let changed = detector.changed_paths(Path::new(LOCAL), &ws, "A", "A").await;
    assert!(changed.is_empty());
}

#[tokio::test]
async fn diff_is_filtered_against_patterns() {
    let vcs = FakeVcs::new();
    vcs.set_diff("svc-a", "A", "B", &["src/main.go", "docs/readme.md"]);
    let detector = ChangeDetector::new(Arc::new(vcs));
    let (_, ws) = spec(&["src/"]);

    let changed = detector.changed_paths(Path::new(LOCAL), &ws, "A", "B").await;
    assert_eq!(changed, vec!["src/main.go"]);
}

#[tokio::test]
async fn diff_failure_assumes_everything_changed() {
    init_tracing();
    let vcs = FakeVcs::new();
    vcs.fail_diff("svc-a", true);
    let detector = ChangeDetector::new(Arc::new(vcs));
    let (_, ws) = spec(&["src/", "deploy/*"]);

    let changed = detector.changed_paths(Path::new(LOCAL), &ws, "A", "B").await;
    assert_eq!(changed, vec!["src/", "deploy/*"]);
}
