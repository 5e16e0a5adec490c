//! Failure Analyzer: turns a [`PatternError`] or [`Mismatch`] into an
//! actionable suggestion — a likely operator typo, or a type mismatch that
//! is numerically equal across a string/number boundary. Purely advisory:
//! callers decide whether and how to surface it.

use crate::pattern::{Mismatch, PatternError};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub kind: String,
    pub severity: Severity,
    pub original: String,
    pub corrected: Option<String>,
    pub rationale: String,
}

/// Common operator names borrowed from other assertion DSLs that are not
/// registered here under that spelling.
const OPERATOR_ALIASES: &[(&str, &str)] = &[
    ("gt", "greaterThan"),
    ("gte", "greaterThanOrEqual"),
    ("lt", "lessThan"),
    ("lte", "lessThanOrEqual"),
    ("eq", "equals"),
    ("ne", "notEquals"),
    ("neq", "notEquals"),
    ("arrayHas", "arrayContains"),
    ("includes", "contains"),
    ("isType", "type"),
    ("regexMatch", "regex"),
    ("matches", "regex"),
    ("isEmpty", "stringEmpty"),
    ("notEmpty", "stringNotEmpty"),
];

/// Looks for "unknown operator 'match:X'" / "unknown composite operator
/// 'match:X'" reasons and suggests the closest registered name when `X`'s
/// leading token is a recognized alias.
pub fn suggest_for_pattern_error(error: &PatternError) -> Option<Suggestion> {
    let op_with_args = error
        .reason
        .strip_prefix("unknown operator 'match:")
        .or_else(|| error.reason.strip_prefix("unknown composite operator 'match:"))?
        .trim_end_matches('\'');

    let bare = op_with_args.split(':').next().unwrap_or(op_with_args);
    let (_, full) = OPERATOR_ALIASES.iter().find(|(alias, _)| *alias == bare)?;

    let corrected = if bare == op_with_args {
        format!("match:{full}")
    } else {
        format!("match:{}{}", full, &op_with_args[bare.len()..])
    };

    Some(Suggestion {
        kind: "operator-typo".to_string(),
        severity: Severity::Warning,
        original: format!("match:{op_with_args}"),
        corrected: Some(corrected),
        rationale: format!("'{bare}' is not a registered operator; did you mean '{full}'?"),
    })
}

/// Flags the common case of a literal mismatch that is actually a
/// string/number type mismatch on an otherwise-equal value, e.g. expected
/// `42` against actual `"42"`.
pub fn suggest_for_mismatch(mismatch: &Mismatch) -> Option<Suggestion> {
    if mismatch.reason != "literal values differ" {
        return None;
    }

    if let (Some(expected_num), Some(actual_str)) = (mismatch.expected.as_f64(), mismatch.actual.as_str()) {
        if actual_str.trim().parse::<f64>().ok() == Some(expected_num) {
            return Some(Suggestion {
                kind: "type-mismatch".to_string(),
                severity: Severity::Info,
                original: mismatch.expected.to_string(),
                corrected: Some("match:type:string".to_string()),
                rationale: "expected a JSON number but the server returned the same value as a string"
                    .to_string(),
            });
        }
    }

    if let (Some(expected_str), Some(actual_num)) = (mismatch.expected.as_str(), mismatch.actual.as_f64()) {
        if expected_str.trim().parse::<f64>().ok() == Some(actual_num) {
            return Some(Suggestion {
                kind: "type-mismatch".to_string(),
                severity: Severity::Info,
                original: mismatch.expected.to_string(),
                corrected: Some("match:type:number".to_string()),
                rationale: "expected a string but the server returned the same value as a JSON number"
                    .to_string(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suggests_greater_than_for_gt() {
        let err = PatternError { path: "$.a".into(), reason: "unknown operator 'match:gt:5'".into() };
        let s = suggest_for_pattern_error(&err).expect("suggestion");
        assert_eq!(s.corrected.as_deref(), Some("match:greaterThan:5"));
    }

    #[test]
    fn suggests_array_contains_for_arrayhas() {
        let err = PatternError {
            path: "$.tools".into(),
            reason: "unknown operator 'match:arrayHas:read_file'".into(),
        };
        let s = suggest_for_pattern_error(&err).expect("suggestion");
        assert_eq!(s.corrected.as_deref(), Some("match:arrayContains:read_file"));
    }

    #[test]
    fn no_suggestion_for_genuinely_unknown_operator() {
        let err = PatternError { path: "$.a".into(), reason: "unknown operator 'match:frobnicate'".into() };
        assert!(suggest_for_pattern_error(&err).is_none());
    }

    #[test]
    fn flags_number_vs_string_mismatch() {
        let m = Mismatch {
            path: "$.count".into(),
            expected: json!(42),
            actual: json!("42"),
            reason: "literal values differ".into(),
        };
        let s = suggest_for_mismatch(&m).expect("suggestion");
        assert_eq!(s.kind, "type-mismatch");
    }

    #[test]
    fn no_suggestion_for_unrelated_mismatch() {
        let m = Mismatch {
            path: "$.count".into(),
            expected: json!(42),
            actual: json!(7),
            reason: "literal values differ".into(),
        };
        assert!(suggest_for_mismatch(&m).is_none());
    }
}
