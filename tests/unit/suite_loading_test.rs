//! Suite loading from disk: globs, multi-document streams, and error
//! reporting.

use conductor::error::HarnessError;
use conductor::suite::load_suites;

const SUITE_A: &str = r#"
description: suite a
tests:
  - it: pings
    request: { method: ping }
"#;

const SUITE_B: &str = r#"
description: suite b
tests:
  - it: lists
    request: { method: tools/list }
---
description: suite b2
tests:
  - it: calls
    request: { method: tools/call, params: { name: echo } }
"#;

#[test]
fn loads_suites_matched_by_glob() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.test.yaml"), SUITE_A).unwrap();
    std::fs::write(dir.path().join("b.test.yaml"), SUITE_B).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

    let pattern = format!("{}/*.test.yaml", dir.path().display());
    let suites = load_suites(&[pattern]).unwrap();

    // Multi-document streams contribute one suite per document.
    assert_eq!(suites.len(), 3);
    let mut descriptions: Vec<&str> =
        suites.iter().map(|s| s.description.as_str()).collect();
    descriptions.sort_unstable();
    assert_eq!(descriptions, vec!["suite a", "suite b", "suite b2"]);
}

#[test]
fn unmatched_patterns_load_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = format!("{}/*.yaml", dir.path().display());
    let suites = load_suites(&[pattern]).unwrap();
    assert!(suites.is_empty());
}

#[test]
fn malformed_yaml_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "description: [unclosed\n").unwrap();

    let err = load_suites(&[path.display().to_string()]).unwrap_err();
    match err {
        HarnessError::SuiteInvalid { path: p, .. } => {
            assert!(p.contains("broken.yaml"));
        }
        other => panic!("expected SuiteInvalid, got {other}"),
    }
}

#[test]
fn missing_test_fields_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("incomplete.yaml");
    // A test without a request is unusable.
    std::fs::write(&path, "description: x\ntests:\n  - it: nameless\n").unwrap();

    assert!(load_suites(&[path.display().to_string()]).is_err());
}
