//! Property tests for the matcher.

use conductor::matcher::match_template;
use proptest::prelude::*;
use serde_json::Value;

/// Arbitrary JSON values. Generated strings never start with `match:`
/// (the character class has no colon), so templates built from them
/// exercise the literal-matching paths.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9f64).prop_map(|f| serde_json::json!(f)),
        "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-zA-Z0-9_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Deep-equality round-trip: with no operators in the template,
    /// every value matches itself.
    #[test]
    fn value_matches_itself(value in arb_json()) {
        let outcome = match_template(&value, &value);
        prop_assert!(outcome.passed, "diags: {:?}", outcome.diagnostics);
        prop_assert!(outcome.diagnostics.is_empty());
    }

    /// The matcher is total and honest: it never panics, and a failed
    /// match always carries at least one diagnostic.
    #[test]
    fn failure_always_carries_a_diagnostic(
        template in arb_json(),
        actual in arb_json(),
    ) {
        let outcome = match_template(&template, &actual);
        if !outcome.passed {
            prop_assert!(!outcome.diagnostics.is_empty());
        }
    }
}
