//! Pattern Engine: walks an expected-value tree against an actual
//! `serde_json::Value`, treating `match:`-prefixed strings and a small set
//! of reserved object keys as typed operators instead of literal values.

pub mod date;
pub mod operators;
pub mod path;

use serde_json::Value;
use std::fmt;

/// One point of disagreement between expected and actual, anchored to the
/// dotted path where it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub path: String,
    pub expected: Value,
    pub actual: Value,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Match,
    Mismatch(Mismatch),
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match)
    }
}

/// A malformed pattern: unknown operator, bad arguments, or a reserved/
/// non-reserved key mixture the engine refuses to interpret. Distinct from
/// [`Mismatch`], which is a well-formed comparison that simply failed —
/// a `PatternError` aborts the suite as malformed rather than failing one
/// test.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{reason} (at {path})")]
pub struct PatternError {
    pub path: String,
    pub reason: String,
}

const RESERVED_KEYS: &[&str] = &[
    "match:partial",
    "match:arrayElements",
    "match:extractField",
    "match:crossField",
];

fn reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key) || is_negated_reserved(key)
}

fn is_negated_reserved(key: &str) -> bool {
    key.strip_prefix("match:not:")
        .map(|op| RESERVED_KEYS.iter().any(|r| *r == format!("match:{op}")))
        .unwrap_or(false)
}

fn strip_reserved_prefix(key: &str) -> &str {
    key.strip_prefix("match:not:")
        .unwrap_or_else(|| key.strip_prefix("match:").unwrap_or(key))
}

fn is_negated_key(key: &str) -> bool {
    key.starts_with("match:not:")
}

/// Entry point: compares `pattern` (the expected-value tree from a suite
/// file) against `actual` (a live JSON-RPC value), returning either a
/// match or the first mismatch found. Returns `Err` when the pattern
/// itself cannot be interpreted — an unknown operator, bad arguments, or
/// an illegal mixture of reserved and literal keys.
pub fn evaluate(pattern: &Value, actual: &Value) -> Result<Outcome, PatternError> {
    evaluate_at(pattern, actual, "$")
}

fn evaluate_at(pattern: &Value, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    match pattern {
        Value::String(s) if s.starts_with("match:") => {
            let token = operators::tokenize(path, s)?;
            operators::evaluate(&token, actual, path)
        }
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {
            if pattern == actual {
                Ok(Outcome::Match)
            } else {
                Ok(Outcome::Mismatch(Mismatch {
                    path: path.to_string(),
                    expected: pattern.clone(),
                    actual: actual.clone(),
                    reason: "literal values differ".to_string(),
                }))
            }
        }
        Value::Array(expected_items) => evaluate_array(expected_items, actual, path),
        Value::Object(fields) => {
            let reserved: Vec<&String> = fields.keys().filter(|k| reserved_key(k)).collect();
            if reserved.is_empty() {
                evaluate_object_fields(fields, actual, path)
            } else if reserved.len() > 1 {
                Err(PatternError {
                    path: path.to_string(),
                    reason: "a pattern object may declare at most one composite match: operator"
                        .to_string(),
                })
            } else {
                let reserved_key_name = reserved[0];
                let op = strip_reserved_prefix(reserved_key_name);
                let allowed_companion: &[&str] = if op == "extractField" { &["value"] } else { &[] };
                let extra: Vec<&String> = fields
                    .keys()
                    .filter(|k| *k != reserved_key_name && !allowed_companion.contains(&k.as_str()))
                    .collect();
                if !extra.is_empty() {
                    return Err(PatternError {
                        path: path.to_string(),
                        reason: format!(
                            "pattern object mixes '{reserved_key_name}' with non-reserved key(s): {}",
                            extra.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    });
                }
                evaluate_composite(reserved_key_name, fields, actual, path)
            }
        }
    }
}

fn evaluate_array(expected_items: &[Value], actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let actual_items = match actual.as_array() {
        Some(items) => items,
        None => {
            return Ok(Outcome::Mismatch(Mismatch {
                path: path.to_string(),
                expected: Value::Array(expected_items.to_vec()),
                actual: actual.clone(),
                reason: "expected an array".to_string(),
            }))
        }
    };

    if expected_items.len() != actual_items.len() {
        return Ok(Outcome::Mismatch(Mismatch {
            path: path.to_string(),
            expected: Value::from(expected_items.len()),
            actual: Value::from(actual_items.len()),
            reason: format!(
                "array length mismatch: expected {}, got {}",
                expected_items.len(),
                actual_items.len()
            ),
        }));
    }

    for (i, (expected_item, actual_item)) in expected_items.iter().zip(actual_items).enumerate() {
        let child_path = format!("{path}[{i}]");
        match evaluate_at(expected_item, actual_item, &child_path)? {
            Outcome::Match => continue,
            mismatch => return Ok(mismatch),
        }
    }
    Ok(Outcome::Match)
}

fn evaluate_object_fields(
    fields: &serde_json::Map<String, Value>,
    actual: &Value,
    path: &str,
) -> Result<Outcome, PatternError> {
    let Some(actual_obj) = actual.as_object() else {
        return Ok(Outcome::Mismatch(Mismatch {
            path: path.to_string(),
            expected: Value::Object(fields.clone()),
            actual: actual.clone(),
            reason: "expected an object".to_string(),
        }));
    };

    for (key, expected_value) in fields {
        let child_path = format!("{path}.{key}");
        match actual_obj.get(key) {
            Some(actual_value) => match evaluate_at(expected_value, actual_value, &child_path)? {
                Outcome::Match => continue,
                mismatch => return Ok(mismatch),
            },
            None => {
                return Ok(Outcome::Mismatch(Mismatch {
                    path: child_path,
                    expected: expected_value.clone(),
                    actual: Value::Null,
                    reason: "field missing from actual value".to_string(),
                }))
            }
        }
    }
    Ok(Outcome::Match)
}

fn evaluate_composite(
    reserved_key_name: &str,
    fields: &serde_json::Map<String, Value>,
    actual: &Value,
    path: &str,
) -> Result<Outcome, PatternError> {
    let negated = is_negated_key(reserved_key_name);
    let op = strip_reserved_prefix(reserved_key_name);
    let operand = &fields[reserved_key_name];

    let base = match op {
        "partial" => evaluate_partial(operand, actual, path),
        "arrayElements" => evaluate_array_elements(operand, actual, path),
        "extractField" => evaluate_extract_field(reserved_key_name, operand, fields, actual, path),
        "crossField" => evaluate_cross_field(operand, actual, path),
        other => Err(PatternError {
            path: path.to_string(),
            reason: format!("unknown composite operator 'match:{other}'"),
        }),
    }?;

    if negated {
        Ok(match base {
            Outcome::Match => Outcome::Mismatch(Mismatch {
                path: path.to_string(),
                expected: Value::String(format!("match:not:{op}")),
                actual: actual.clone(),
                reason: "negated composite operator matched but should not have".to_string(),
            }),
            Outcome::Mismatch(_) => Outcome::Match,
        })
    } else {
        Ok(base)
    }
}

/// `match:partial` (and its negated companion) requires no extra fields:
/// a literal object match performed with unknown actual keys ignored.
fn evaluate_partial(operand: &Value, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let Some(expected_fields) = operand.as_object() else {
        return Err(PatternError {
            path: path.to_string(),
            reason: "match:partial requires an object operand".to_string(),
        });
    };
    let Some(actual_obj) = actual.as_object() else {
        return Ok(Outcome::Mismatch(Mismatch {
            path: path.to_string(),
            expected: operand.clone(),
            actual: actual.clone(),
            reason: "expected an object for partial match".to_string(),
        }));
    };

    for (key, expected_value) in expected_fields {
        let child_path = format!("{path}.{key}");
        match actual_obj.get(key) {
            Some(actual_value) => match evaluate_at(expected_value, actual_value, &child_path)? {
                Outcome::Match => continue,
                mismatch => return Ok(mismatch),
            },
            None => {
                return Ok(Outcome::Mismatch(Mismatch {
                    path: child_path,
                    expected: expected_value.clone(),
                    actual: Value::Null,
                    reason: "field missing from actual value (partial match)".to_string(),
                }))
            }
        }
    }
    Ok(Outcome::Match)
}

/// `match:arrayElements` applies one pattern to every element of an actual
/// array, independent of its length.
fn evaluate_array_elements(operand: &Value, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let Some(actual_items) = actual.as_array() else {
        return Ok(Outcome::Mismatch(Mismatch {
            path: path.to_string(),
            expected: operand.clone(),
            actual: actual.clone(),
            reason: "expected an array for arrayElements match".to_string(),
        }));
    };

    for (i, item) in actual_items.iter().enumerate() {
        let child_path = format!("{path}[{i}]");
        match evaluate_at(operand, item, &child_path)? {
            Outcome::Match => continue,
            mismatch => return Ok(mismatch),
        }
    }
    Ok(Outcome::Match)
}

/// `match:extractField: "path"` paired with a companion `value` key:
/// resolves `path` against `actual`, then compares the extracted value(s)
/// (or an embedded `match:` pattern) against `value`.
fn evaluate_extract_field(
    reserved_key_name: &str,
    operand: &Value,
    fields: &serde_json::Map<String, Value>,
    actual: &Value,
    path: &str,
) -> Result<Outcome, PatternError> {
    let Some(field_path) = operand.as_str() else {
        return Err(PatternError {
            path: path.to_string(),
            reason: "match:extractField requires a string path operand".to_string(),
        });
    };
    let expected = fields.get("value").ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: "match:extractField requires a companion 'value' key".to_string(),
    })?;

    let extracted = match path::resolve(actual, field_path) {
        path::Resolved::One(v) => v,
        path::Resolved::Many(vs) => Value::Array(vs),
        path::Resolved::Missing => Value::Null,
    };

    let child_path = format!("{path}[extractField:{field_path}]");
    evaluate_at(expected, &extracted, &child_path)
}

/// `match:crossField: "left OP right"` compares two paths within the same
/// actual value, e.g. `"timestamps.updated >= timestamps.created"`.
fn evaluate_cross_field(operand: &Value, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let Some(expr) = operand.as_str() else {
        return Err(PatternError {
            path: path.to_string(),
            reason: "match:crossField requires a string expression operand".to_string(),
        });
    };

    let (left_path, op, right_path) = parse_cross_field_expr(expr).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("malformed crossField expression '{expr}'"),
    })?;

    let left = resolve_side(actual, left_path, path)?;
    let right = resolve_side(actual, right_path, path)?;

    let holds = match op {
        "==" => left == right,
        "!=" => left != right,
        ">" | ">=" | "<" | "<=" => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => compare_ordered(l, r, op),
            _ => match (left.as_str(), right.as_str()) {
                (Some(l), Some(r)) => compare_ordered_str(l, r, op),
                _ => {
                    return Err(PatternError {
                        path: path.to_string(),
                        reason: format!(
                            "crossField '{expr}' compares values that are neither both numbers nor both strings"
                        ),
                    })
                }
            },
        },
        _ => {
            return Err(PatternError {
                path: path.to_string(),
                reason: format!("unsupported crossField operator '{op}'"),
            })
        }
    };

    if holds {
        Ok(Outcome::Match)
    } else {
        Ok(Outcome::Mismatch(Mismatch {
            path: path.to_string(),
            expected: Value::String(expr.to_string()),
            actual: actual.clone(),
            reason: "crossField expression did not hold".to_string(),
        }))
    }
}

fn compare_ordered(l: f64, r: f64, op: &str) -> bool {
    match op {
        ">" => l > r,
        ">=" => l >= r,
        "<" => l < r,
        "<=" => l <= r,
        _ => unreachable!(),
    }
}

fn compare_ordered_str(l: &str, r: &str, op: &str) -> bool {
    match op {
        ">" => l > r,
        ">=" => l >= r,
        "<" => l < r,
        "<=" => l <= r,
        _ => unreachable!(),
    }
}

/// A `crossField` side is a path into `actual` unless it parses as a bare
/// JSON literal (a number, a quoted string, `true`/`false`/`null`), in
/// which case it is compared directly.
fn resolve_side(actual: &Value, side: &str, path: &str) -> Result<Value, PatternError> {
    if let Ok(literal) = serde_json::from_str::<Value>(side) {
        return Ok(literal);
    }
    match path::resolve(actual, side) {
        path::Resolved::One(v) => Ok(v),
        path::Resolved::Missing => Ok(Value::Null),
        path::Resolved::Many(_) => Err(PatternError {
            path: path.to_string(),
            reason: format!("crossField path '{side}' must resolve to a single value, not a wildcard"),
        }),
    }
}

fn parse_cross_field_expr(expr: &str) -> Option<(&str, &str, &str)> {
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some(idx) = expr.find(op) {
            let left = expr[..idx].trim();
            let right = expr[idx + op.len()..].trim();
            if !left.is_empty() && !right.is_empty() {
                return Some((left, op, right));
            }
        }
    }
    None
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {} ({})",
            self.path, self.expected, self.actual, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_deep_equality() {
        let pattern = json!({"a": 1, "b": [1, 2, 3]});
        let actual = json!({"a": 1, "b": [1, 2, 3]});
        assert_eq!(evaluate(&pattern, &actual).unwrap(), Outcome::Match);
    }

    #[test]
    fn literal_mismatch_reports_path() {
        let pattern = json!({"a": {"b": 1}});
        let actual = json!({"a": {"b": 2}});
        match evaluate(&pattern, &actual).unwrap() {
            Outcome::Mismatch(m) => {
                assert_eq!(m.path, "$.a.b");
                assert_json_diff::assert_json_eq!(m.expected, json!(1));
                assert_json_diff::assert_json_eq!(m.actual, json!(2));
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn scalar_operator_contains() {
        let pattern = json!("match:contains:hello");
        assert_eq!(evaluate(&pattern, &json!("hello world")).unwrap(), Outcome::Match);
        assert!(!evaluate(&pattern, &json!("goodbye")).unwrap().is_match());
    }

    #[test]
    fn negated_scalar_operator() {
        let pattern = json!("match:not:contains:hello");
        assert_eq!(evaluate(&pattern, &json!("goodbye")).unwrap(), Outcome::Match);
        assert!(!evaluate(&pattern, &json!("hello world")).unwrap().is_match());
    }

    #[test]
    fn double_negation_rejected() {
        let pattern = json!("match:not:not:contains:hello");
        assert!(evaluate(&pattern, &json!("hello")).is_err());
    }

    #[test]
    fn array_length_mismatch() {
        let pattern = json!([1, 2, 3]);
        let actual = json!([1, 2]);
        match evaluate(&pattern, &actual).unwrap() {
            Outcome::Mismatch(m) => assert!(m.reason.contains("length")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_ignores_extra_actual_fields() {
        let pattern = json!({"match:partial": {"name": "read_file"}});
        let actual = json!({"name": "read_file", "description": "reads a file"});
        assert_eq!(evaluate(&pattern, &actual).unwrap(), Outcome::Match);
    }

    #[test]
    fn partial_mixed_with_literal_key_is_rejected() {
        let pattern = json!({"match:partial": {"name": "read_file"}, "extra": 1});
        assert!(evaluate(&pattern, &json!({"name": "read_file"})).is_err());
    }

    #[test]
    fn array_elements_mixed_with_literal_key_is_rejected() {
        let pattern = json!({"match:arrayElements": {"match:type": "string"}, "extra": 1});
        assert!(evaluate(&pattern, &json!(["a", "b"])).is_err());
    }

    #[test]
    fn cross_field_mixed_with_literal_key_is_rejected() {
        let pattern = json!({"match:crossField": "count >= minimum", "extra": 1});
        assert!(evaluate(&pattern, &json!({"count": 5, "minimum": 3})).is_err());
    }

    #[test]
    fn array_elements_applies_to_every_item() {
        let pattern = json!({"match:arrayElements": {"match:type": "string"}});
        let actual = json!(["a", "b", "c"]);
        assert_eq!(evaluate(&pattern, &actual).unwrap(), Outcome::Match);

        let bad = json!(["a", 2, "c"]);
        assert!(!evaluate(&pattern, &bad).unwrap().is_match());
    }

    #[test]
    fn extract_field_wildcard_array() {
        let pattern = json!({
            "match:extractField": "tools.*.name",
            "value": ["read_file", "write_file"]
        });
        let actual = json!({"tools": [{"name": "read_file"}, {"name": "write_file"}]});
        assert_eq!(evaluate(&pattern, &actual).unwrap(), Outcome::Match);
    }

    #[test]
    fn extract_field_rejects_extra_keys() {
        let pattern = json!({
            "match:extractField": "a.b",
            "value": 1,
            "other": 2
        });
        assert!(evaluate(&pattern, &json!({"a": {"b": 1}})).is_err());
    }

    #[test]
    fn cross_field_numeric_comparison() {
        let pattern = json!({"match:crossField": "count >= minimum"});
        let actual = json!({"count": 5, "minimum": 3});
        assert_eq!(evaluate(&pattern, &actual).unwrap(), Outcome::Match);

        let bad = json!({"count": 1, "minimum": 3});
        assert!(!evaluate(&pattern, &bad).unwrap().is_match());
    }

    #[test]
    fn type_operator() {
        assert!(evaluate(&json!("match:type:array"), &json!([1, 2])).unwrap().is_match());
        assert!(!evaluate(&json!("match:type:array"), &json!("x")).unwrap().is_match());
    }

    #[test]
    fn between_operator_splits_min_max() {
        assert!(evaluate(&json!("match:between:1:10"), &json!(5)).unwrap().is_match());
        assert!(!evaluate(&json!("match:between:1:10"), &json!(20)).unwrap().is_match());
    }

    #[test]
    fn date_after_operator() {
        assert!(evaluate(&json!("match:dateAfter:2023-01-01"), &json!("2023-06-01")).unwrap().is_match());
        assert!(!evaluate(&json!("match:dateAfter:2023-01-01"), &json!("2022-06-01")).unwrap().is_match());
    }
}
