// tests/shell_action.rs

#![cfg(unix)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use revwatch::config::ActionConfig;
use revwatch::exec::{ActionRequest, ActionRunner, RealActionRunner};
use revwatch_test_utils::{init_tracing, with_timeout};

fn request(local: PathBuf, script: &str, timeout: Duration) -> ActionRequest {
    let mut env = BTreeMap::new();
    env.insert("DEPLOY_ENV".to_string(), "staging".to_string());
    ActionRequest {
        repository: "svc-a".to_string(),
        url: "https://git.example.com/svc-a.git".to_string(),
        local_path: local,
        branch: "main".to_string(),
        files: vec!["src/main.go".to_string(), "src/util.go".to_string()],
        old_hash: "A".to_string(),
        new_hash: "B".to_string(),
        detected_at: Utc::now(),
        action: ActionConfig::Shell {
            script: script.to_string(),
            timeout,
            env,
        },
    }
}

#[tokio::test]
async fn shell_action_sees_change_variables_in_working_copy() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    let script = format!(
        "printf '%s|%s|%s|%s|%s|%s' \"$REVWATCH_REPO_NAME\" \"$REVWATCH_CHANGED_FILES\" \
         \"$REVWATCH_OLD_HASH\" \"$REVWATCH_NEW_HASH\" \"$DEPLOY_ENV\" \"$(pwd)\" > {}",
        out.display()
    );

    let mut runner = RealActionRunner::new();
    let result = with_timeout(runner.run(request(dir.path().to_path_buf(), &script, Duration::from_secs(5)))).await;
    assert!(result.success, "{}", result.error);
    assert_eq!(result.repository, "svc-a");

    let written = std::fs::read_to_string(&out).unwrap();
    let cwd = dir.path().canonicalize().unwrap();
    assert_eq!(
        written,
        format!("svc-a|src/main.go,src/util.go|A|B|staging|{}", cwd.display())
    );
}

#[tokio::test]
async fn failing_script_reports_its_output() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut runner = RealActionRunner::new();

    let result = with_timeout(runner.run(request(
        dir.path().to_path_buf(),
        "echo building; echo broken >&2; exit 3",
        Duration::from_secs(5),
    )))
    .await;

    assert!(!result.success);
    assert!(result.error.contains("broken"), "{}", result.error);
    assert!(result.error.contains("building"), "{}", result.error);
}

#[tokio::test]
async fn slow_script_is_killed_at_the_timeout() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut runner = RealActionRunner::new();

    let result = with_timeout(runner.run(request(
        dir.path().to_path_buf(),
        "sleep 30",
        Duration::from_millis(200),
    )))
    .await;

    assert!(!result.success);
    assert!(result.error.contains("timed out"), "{}", result.error);
}
