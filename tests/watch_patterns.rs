// tests/watch_patterns.rs

use proptest::prelude::*;

use revwatch::watch::{WatchPattern, WatchSet};

fn set(patterns: &[&str]) -> WatchSet {
    let owned: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
    WatchSet::new(&owned).unwrap()
}

#[test]
fn prefix_matches_exact_path_and_children_only() {
    let ws = set(&["src"]);
    assert!(ws.matches("src"));
    assert!(ws.matches("src/main.go"));
    assert!(ws.matches("src/deep/nested/file.rs"));
    assert!(!ws.matches("srcfoo/main.go"));
    assert!(!ws.matches("docs/src/readme.md"));
}

#[test]
fn trailing_slash_is_ignored() {
    let ws = set(&["src/"]);
    assert!(ws.matches("src/main.go"));
    assert!(!ws.matches("srcx"));
}

#[test]
fn single_level_wildcard_covers_directory() {
    let ws = set(&["k8s/*"]);
    assert!(ws.matches("k8s/deployment.yaml"));
    assert!(ws.matches("k8s/overlays/prod/kustomization.yaml"));
    assert!(!ws.matches("k8s"));
    assert!(!ws.matches("k8s-old/deployment.yaml"));
}

#[test]
fn glob_patterns_do_not_cross_separators() {
    let ws = set(&["*.yaml"]);
    assert!(ws.matches("values.yaml"));
    assert!(!ws.matches("charts/values.yaml"));

    let deep = set(&["charts/**/values.yaml"]);
    assert!(deep.matches("charts/api/values.yaml"));
    assert!(deep.matches("charts/a/b/values.yaml"));
    assert!(!deep.matches("charts/api/Chart.yaml"));
}

#[test]
fn brace_glob_names_directories() {
    let ws = set(&["charts/{api,web}"]);
    assert!(ws.matches("charts/api/values.yaml"));
    assert!(ws.matches("charts/web"));
    assert!(!ws.matches("charts/db/values.yaml"));
}

#[test]
fn dot_watches_everything() {
    let ws = set(&["."]);
    assert!(ws.matches("anything/at/all"));
    assert!(matches!(WatchPattern::parse("/").unwrap(), WatchPattern::Prefix(p) if p.is_empty()));
}

#[test]
fn invalid_glob_is_rejected() {
    assert!(WatchPattern::parse("src/[").is_err());
}

#[test]
fn filter_keeps_input_order() {
    let ws = set(&["src/", "deploy/*"]);
    let changed = ["docs/readme.md", "src/main.go", "deploy/app.yaml", "src/lib.go"];
    assert_eq!(
        ws.filter(&changed),
        vec!["src/main.go", "deploy/app.yaml", "src/lib.go"]
    );
    assert_eq!(ws.all(), vec!["src/", "deploy/*"]);
}

proptest! {
    #[test]
    fn filter_returns_exactly_the_matching_subset(
        paths in prop::collection::vec("[a-c]{1,3}(/[a-c]{1,3}){0,3}", 0..20),
    ) {
        let ws = set(&["a", "b/*"]);
        let filtered = ws.filter(&paths);

        let expected: Vec<String> = paths
            .iter()
            .filter(|p| *p == "a" || p.starts_with("a/") || p.starts_with("b/"))
            .cloned()
            .collect();
        prop_assert_eq!(filtered, expected);
    }

    #[test]
    fn paths_outside_every_pattern_never_match(name in "[d-z]{1,8}(/[a-z]{1,8}){0,3}") {
        let ws = set(&["a/", "b/*", "c"]);
        prop_assert!(!ws.matches(&name));
    }
}
