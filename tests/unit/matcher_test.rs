//! Matcher behavior against the documented operator semantics, driven
//! through the public `match_template` entry point.

use conductor::matcher::{match_template, DiagnosticKind};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn passes(template: Value, actual: Value) -> bool {
    match_template(&template, &actual).passed
}

#[test]
fn any_value_matches_itself() {
    for value in [
        json!(null),
        json!(true),
        json!(42),
        json!(4.25),
        json!("text"),
        json!([1, [2, {"x": null}]]),
        json!({"a": {"b": [1, 2, 3]}, "c": "d"}),
    ] {
        assert!(passes(value.clone(), value.clone()), "value: {value}");
    }
}

#[test]
fn not_of_not_is_the_original_verdict() {
    let cases = [
        (json!("match:type:number"), json!(5), true),
        (json!("match:type:number"), json!("five"), false),
        (json!("match:contains:abc"), json!("xxabcxx"), true),
    ];
    for (inner, actual, expected) in cases {
        let double = json!({"match:not": {"match:not": inner}});
        assert_eq!(passes(double, actual.clone()), expected, "actual: {actual}");
    }
}

#[test]
fn array_length_zero_passes_only_on_empty() {
    assert!(passes(json!("match:arrayLength:0"), json!([])));
    assert!(!passes(json!("match:arrayLength:0"), json!([1])));
    assert!(!passes(json!("match:arrayLength:0"), json!({})));
}

#[test]
fn degenerate_between_is_exact() {
    assert!(passes(json!("match:between:5:5"), json!(5)));
    assert!(passes(json!("match:between:5:5"), json!(5.0)));
    assert!(!passes(json!("match:between:5:5"), json!(4.999)));
    assert!(!passes(json!("match:between:5:5"), json!(5.001)));
}

#[test]
fn date_after_is_strict_at_the_threshold() {
    assert!(!passes(
        json!("match:dateAfter:2026-03-01T00:00:00Z"),
        json!("2026-03-01T00:00:00Z")
    ));
    assert!(passes(
        json!("match:dateAfter:2026-03-01T00:00:00Z"),
        json!("2026-03-01T00:00:01Z")
    ));
}

#[test]
fn extract_field_miss_fails_unless_negated() {
    let template = json!({"match:extractField": "result.tools", "value": "match:exists"});
    let actual = json!({"result": {}});
    let outcome = match_template(&template, &actual);
    assert!(!outcome.passed);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Extract);

    let negated = json!({"match:not": template});
    assert!(passes(negated, actual));
}

#[test]
fn semver_regex_on_a_version_field() {
    let template = json!({"result": {"version": "match:regex:^\\d+\\.\\d+\\.\\d+$"}});
    assert!(passes(template.clone(), json!({"result": {"version": "1.2.3"}})));
    assert!(!passes(template, json!({"result": {"version": "1.2"}})));
}

#[test]
fn partial_object_matching() {
    let actual = json!({"result": {"a": 1, "b": 2, "c": 3}});
    let partial = json!({"result": {"match:partial": true, "a": 1}});
    assert!(passes(partial, actual.clone()));

    let strict = json!({"result": {"a": 1}});
    let outcome = match_template(&strict, &actual);
    assert!(!outcome.passed);
    let extras: Vec<&str> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::UnexpectedKey)
        .map(|d| d.path.as_str())
        .collect();
    assert_eq!(extras, vec!["/result/b", "/result/c"]);
}

#[test]
fn wildcard_extract_with_array_elements() {
    let template = json!({
        "match:extractField": "result.items.*.v",
        "value": "match:arrayElements:match:type:number"
    });
    let actual = json!({"result": {"items": [{"v": 1}, {"v": 2}, {"v": 3}]}});
    assert!(passes(template, actual));
}

#[test]
fn tools_array_contains_by_field() {
    let template = json!({"result": {"tools": "match:arrayContains:{name:echo}"}});
    let actual = json!({"result": {"tools": [
        {"name": "list_files", "inputSchema": {}},
        {"name": "echo", "inputSchema": {}}
    ]}});
    assert!(passes(template.clone(), actual));
    assert!(!passes(template, json!({"result": {"tools": []}})));
}

#[test]
fn unknown_matcher_suggests_and_never_panics() {
    let outcome = match_template(&json!("match:arrayLenght:2"), &json!([1, 2]));
    assert!(!outcome.passed);
    assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnknownMatcher);
    assert!(outcome.diagnostics[0].message.contains("arrayLength"));
}

#[test]
fn matcher_is_total_on_awkward_inputs() {
    // None of these should panic, whatever the verdict.
    let templates = [
        json!("match:"),
        json!("match:between:"),
        json!("match:not:"),
        json!({"match:extractField": 5}),
        json!({"match:partial": "yes"}),
        json!([[[["match:type:number"]]]]),
    ];
    for template in templates {
        let _ = match_template(&template, &json!({"anything": [1, 2, 3]}));
    }
}

#[test]
fn mixed_literal_and_operator_templates() {
    let template = json!({
        "result": {
            "count": "match:greaterThan:0",
            "items": ["match:type:object", {"id": "match:type:number"}],
            "label": "fixed"
        }
    });
    let actual = json!({
        "result": {
            "count": 2,
            "items": [{"anything": true}, {"id": 7}],
            "label": "fixed"
        }
    });
    let outcome = match_template(&template, &actual);
    assert!(outcome.passed, "diags: {:?}", outcome.diagnostics);
}
