//! Property-based tests for the pattern engine's scalar operators.

use mcp_aegis_rs::pattern::evaluate;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    #[test]
    fn contains_matches_any_embedded_substring(
        prefix in "[a-zA-Z0-9]{0,5}",
        needle in "[a-zA-Z0-9]{1,5}",
        suffix in "[a-zA-Z0-9]{0,5}",
    ) {
        let haystack = format!("{prefix}{needle}{suffix}");
        let pattern = json!(format!("match:contains:{needle}"));
        let outcome = evaluate(&pattern, &json!(haystack)).unwrap();
        prop_assert!(outcome.is_match());
    }

    #[test]
    fn array_length_matches_the_actual_length(len in 0usize..12) {
        let items: Vec<serde_json::Value> = (0..len).map(|i| json!(i)).collect();
        let pattern = json!(format!("match:arrayLength:{len}"));
        let outcome = evaluate(&pattern, &json!(items)).unwrap();
        prop_assert!(outcome.is_match());

        let wrong_pattern = json!(format!("match:arrayLength:{}", len + 1));
        let wrong_outcome = evaluate(&wrong_pattern, &json!(items)).unwrap();
        prop_assert!(!wrong_outcome.is_match());
    }

    #[test]
    fn between_is_inclusive_of_its_bounds(min in -1000i64..1000, span in 0i64..1000) {
        let max = min + span;
        let pattern = json!(format!("match:between:{min}:{max}"));
        prop_assert!(evaluate(&pattern, &json!(min)).unwrap().is_match());
        prop_assert!(evaluate(&pattern, &json!(max)).unwrap().is_match());
        prop_assert!(!evaluate(&pattern, &json!(max + 1)).unwrap().is_match());
    }
}
