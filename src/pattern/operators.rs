//! The `match:` operator registry: tokenizing `match:OP[:ARG...]` (and its
//! `match:not:` negated form) and evaluating each named operator against an
//! actual JSON value.

use super::date;
use super::{Mismatch, Outcome, PatternError};
use serde_json::Value;

/// A parsed `match:` token: `negated` for the `not:` wrapper, `op` the
/// operator name, and `args` the colon-separated arguments that followed.
pub struct Token {
    pub negated: bool,
    pub op: String,
    pub args: Vec<String>,
}

pub fn tokenize(path: &str, raw: &str) -> Result<Token, PatternError> {
    let rest = raw.strip_prefix("match:").ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("not a match: pattern: {raw}"),
    })?;

    let (negated, rest) = match rest.strip_prefix("not:") {
        Some(after_not) => {
            if after_not.starts_with("not:") {
                return Err(PatternError {
                    path: path.to_string(),
                    reason: "double negation (match:not:not:...) is not allowed".to_string(),
                });
            }
            (true, after_not)
        }
        None => (false, rest),
    };

    let mut parts = rest.splitn(2, ':');
    let op = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PatternError {
            path: path.to_string(),
            reason: "empty operator name".to_string(),
        })?
        .to_string();
    let args = match parts.next() {
        Some(rest_args) if !rest_args.is_empty() => vec![rest_args.to_string()],
        _ => vec![],
    };

    Ok(Token { negated, op, args })
}

/// Splits a single argument blob into two sub-arguments at the first colon
/// position where both halves satisfy `valid`. This resolves the
/// MIN:MAX / D1:D2 ambiguity without hard-coding a date format, since ISO
/// datetimes themselves contain colons.
fn split_two(blob: &str, valid: impl Fn(&str) -> bool) -> Option<(String, String)> {
    for (i, b) in blob.bytes().enumerate() {
        if b == b':' {
            let (a, rest) = (&blob[..i], &blob[i + 1..]);
            if valid(a) && valid(rest) {
                return Some((a.to_string(), rest.to_string()));
            }
        }
    }
    None
}

fn is_number(s: &str) -> bool {
    s.parse::<f64>().is_ok()
}

fn is_date(s: &str) -> bool {
    date::parse_str(s).is_some()
}

fn arg(token: &Token, path: &str) -> Result<&str, PatternError> {
    token.args.first().map(|s| s.as_str()).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("operator '{}' requires an argument", token.op),
    })
}

fn numeric_pair(token: &Token, path: &str) -> Result<(f64, f64), PatternError> {
    let blob = arg(token, path)?;
    let (a, b) = split_two(blob, is_number).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("operator '{}' requires MIN:MAX numeric arguments", token.op),
    })?;
    Ok((a.parse().unwrap(), b.parse().unwrap()))
}

fn date_pair(token: &Token, path: &str) -> Result<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>), PatternError> {
    let blob = arg(token, path)?;
    let (a, b) = split_two(blob, is_date).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("operator '{}' requires D1:D2 date arguments", token.op),
    })?;
    Ok((date::parse_str(&a).unwrap(), date::parse_str(&b).unwrap()))
}

fn parse_usize(s: &str, path: &str, op: &str) -> Result<usize, PatternError> {
    s.parse::<usize>().map_err(|_| PatternError {
        path: path.to_string(),
        reason: format!("operator '{op}' expects a non-negative integer argument, got '{s}'"),
    })
}

fn parse_f64(s: &str, path: &str, op: &str) -> Result<f64, PatternError> {
    s.parse::<f64>().map_err(|_| PatternError {
        path: path.to_string(),
        reason: format!("operator '{op}' expects a numeric argument, got '{s}'"),
    })
}

fn mismatch(path: &str, expected: Value, actual: &Value, reason: impl Into<String>) -> Outcome {
    Outcome::Mismatch(Mismatch {
        path: path.to_string(),
        expected,
        actual: actual.clone(),
        reason: reason.into(),
    })
}

/// Evaluates a single scalar `match:` operator (already tokenized) against
/// `actual`, applying `not:` negation uniformly around the base result.
pub fn evaluate(token: &Token, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let base = evaluate_base(token, actual, path)?;
    if token.negated {
        Ok(match base {
            Outcome::Match => mismatch(
                path,
                Value::String(format!("match:not:{}", token.op)),
                actual,
                "negated operator matched but should not have",
            ),
            Outcome::Mismatch(_) => Outcome::Match,
        })
    } else {
        Ok(base)
    }
}

fn evaluate_base(token: &Token, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let op = token.op.as_str();
    match op {
        // --- string ---
        "contains" => string_op(token, actual, path, |a, s| a.contains(s)),
        "startsWith" => string_op(token, actual, path, |a, s| a.starts_with(s)),
        "endsWith" => string_op(token, actual, path, |a, s| a.ends_with(s)),
        "equalsIgnoreCase" => string_op(token, actual, path, |a, s| a.eq_ignore_ascii_case(s)),
        "containsIgnoreCase" => {
            string_op(token, actual, path, |a, s| a.to_lowercase().contains(&s.to_lowercase()))
        }
        "regex" => {
            let pattern = arg(token, path)?;
            let re = regex::Regex::new(pattern).map_err(|e| PatternError {
                path: path.to_string(),
                reason: format!("invalid regex '{pattern}': {e}"),
            })?;
            string_op_re(actual, path, &re)
        }
        "stringLength" => string_len_op(token, actual, path, |len, n| len == n),
        "stringLengthLessThan" => string_len_op(token, actual, path, |len, n| len < n),
        "stringLengthGreaterThan" => string_len_op(token, actual, path, |len, n| len > n),
        "stringLengthGreaterThanOrEqual" => string_len_op(token, actual, path, |len, n| len >= n),
        "stringLengthLessThanOrEqual" => string_len_op(token, actual, path, |len, n| len <= n),
        "stringLengthBetween" => {
            let blob = arg(token, path)?;
            let (min, max) = split_two(blob, |s| s.parse::<usize>().is_ok()).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: "stringLengthBetween requires MIN:MAX".to_string(),
            })?;
            let (min, max): (usize, usize) = (min.parse().unwrap(), max.parse().unwrap());
            string_len_op_range(actual, path, min, max)
        }
        "stringEmpty" => string_predicate(actual, path, |s| s.is_empty()),
        "stringNotEmpty" => string_predicate(actual, path, |s| !s.is_empty()),

        // --- array ---
        "arrayLength" => {
            let n = parse_usize(arg(token, path)?, path, op)?;
            match actual.as_array() {
                Some(a) if a.len() == n => Ok(Outcome::Match),
                Some(a) => Ok(mismatch(path, Value::from(n), actual, format!("expected array length {n}, got {}", a.len()))),
                None => Ok(mismatch(path, Value::from(n), actual, "expected an array")),
            }
        }
        "arrayContains" => array_contains(token, actual, path),
        "arrayElements" => Err(PatternError {
            path: path.to_string(),
            reason: "arrayElements must be used as a composite object pattern, not a scalar operator".into(),
        }),

        // --- type ---
        "type" => {
            let want = arg(token, path)?;
            let got = type_name(actual);
            if got == want {
                Ok(Outcome::Match)
            } else {
                Ok(mismatch(path, Value::String(want.to_string()), actual, format!("expected type '{want}', got '{got}'")))
            }
        }
        "exists" => {
            if actual.is_null() {
                Ok(mismatch(path, Value::String("exists".into()), actual, "value does not exist"))
            } else {
                Ok(Outcome::Match)
            }
        }
        "length" => {
            let n = parse_usize(arg(token, path)?, path, op)?;
            let len = match actual {
                Value::String(s) => Some(s.chars().count()),
                Value::Array(a) => Some(a.len()),
                _ => None,
            };
            match len {
                Some(len) if len == n => Ok(Outcome::Match),
                Some(len) => Ok(mismatch(path, Value::from(n), actual, format!("expected length {n}, got {len}"))),
                None => Ok(mismatch(path, Value::from(n), actual, "expected a string or array")),
            }
        }
        "count" => {
            let n = parse_usize(arg(token, path)?, path, op)?;
            match actual.as_object() {
                Some(o) if o.len() == n => Ok(Outcome::Match),
                Some(o) => Ok(mismatch(path, Value::from(n), actual, format!("expected {n} keys, got {}", o.len()))),
                None => Ok(mismatch(path, Value::from(n), actual, "expected an object")),
            }
        }

        // --- numeric ---
        "equals" => numeric_cmp(token, actual, path, |a, n| a == n),
        "notEquals" => numeric_cmp(token, actual, path, |a, n| a != n),
        "greaterThan" => numeric_cmp(token, actual, path, |a, n| a > n),
        "greaterThanOrEqual" => numeric_cmp(token, actual, path, |a, n| a >= n),
        "lessThan" => numeric_cmp(token, actual, path, |a, n| a < n),
        "lessThanOrEqual" => numeric_cmp(token, actual, path, |a, n| a <= n),
        "between" | "range" => {
            let (min, max) = numeric_pair(token, path)?;
            numeric_cmp_raw(actual, path, op, |a| a >= min && a <= max)
        }
        "approximately" => {
            let blob = arg(token, path)?;
            let (v, tol) = split_two(blob, is_number).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: "approximately requires VALUE:TOLERANCE".to_string(),
            })?;
            let (v, tol): (f64, f64) = (v.parse().unwrap(), tol.parse().unwrap());
            numeric_cmp_raw(actual, path, op, |a| (a - v).abs() <= tol)
        }
        "multipleOf" | "divisibleBy" => {
            let n = parse_f64(arg(token, path)?, path, op)?;
            numeric_cmp_raw(actual, path, op, |a| n != 0.0 && (a % n).abs() < f64::EPSILON)
        }
        "decimalPlaces" => {
            let n = parse_usize(arg(token, path)?, path, op)?;
            let num = actual.as_f64().ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: "decimalPlaces requires a numeric actual value".to_string(),
            })?;
            let text = format!("{num}");
            let places = text.split('.').nth(1).map(str::len).unwrap_or(0);
            if places == n {
                Ok(Outcome::Match)
            } else {
                Ok(mismatch(path, Value::from(n), actual, format!("expected {n} decimal places, got {places}")))
            }
        }

        // --- date ---
        "dateValid" => match date::parse_value(actual) {
            Some(_) => Ok(Outcome::Match),
            None => Ok(mismatch(path, Value::String("dateValid".into()), actual, "value is not a parseable date")),
        },
        "dateAfter" => date_cmp(token, actual, path, |a, b| a > b),
        "dateBefore" => date_cmp(token, actual, path, |a, b| a < b),
        "dateEquals" => date_cmp(token, actual, path, |a, b| a == b),
        "dateBetween" => {
            let (start, end) = date_pair(token, path)?;
            let actual_date = date::parse_value(actual).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: "actual value is not a parseable date".to_string(),
            })?;
            if actual_date >= start && actual_date <= end {
                Ok(Outcome::Match)
            } else {
                Ok(mismatch(path, Value::String(arg(token, path)?.to_string()), actual, "date not within range"))
            }
        }
        "dateAge" => {
            let spec = arg(token, path)?;
            let max_age = date::parse_age_spec(spec).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: format!("invalid dateAge spec '{spec}'"),
            })?;
            let actual_date = date::parse_value(actual).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: "actual value is not a parseable date".to_string(),
            })?;
            let age = chrono::Utc::now().signed_duration_since(actual_date);
            if age <= max_age {
                Ok(Outcome::Match)
            } else {
                Ok(mismatch(path, Value::String(spec.to_string()), actual, format!("date age {age} exceeds {max_age}")))
            }
        }
        "dateFormat" => {
            let kind_str = arg(token, path)?;
            let kind = date::parse_format_kind(kind_str).ok_or_else(|| PatternError {
                path: path.to_string(),
                reason: format!("unknown dateFormat kind '{kind_str}'"),
            })?;
            if date::matches_format(actual, kind) {
                Ok(Outcome::Match)
            } else {
                Ok(mismatch(path, Value::String(kind_str.to_string()), actual, format!("value does not match date format '{kind_str}'")))
            }
        }

        _ => Err(PatternError {
            path: path.to_string(),
            reason: format!("unknown operator 'match:{op}'"),
        }),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_op(token: &Token, actual: &Value, path: &str, pred: impl Fn(&str, &str) -> bool) -> Result<Outcome, PatternError> {
    let needle = arg(token, path)?;
    match actual.as_str() {
        Some(s) if pred(s, needle) => Ok(Outcome::Match),
        Some(_) => Ok(mismatch(path, Value::String(needle.to_string()), actual, format!("'{}' check failed against '{needle}'", token.op))),
        None => Ok(mismatch(path, Value::String(needle.to_string()), actual, "expected a string")),
    }
}

fn string_op_re(actual: &Value, path: &str, re: &regex::Regex) -> Result<Outcome, PatternError> {
    match actual.as_str() {
        Some(s) if re.is_match(s) => Ok(Outcome::Match),
        Some(_) => Ok(mismatch(path, Value::String(re.as_str().to_string()), actual, "regex did not match")),
        None => Ok(mismatch(path, Value::String(re.as_str().to_string()), actual, "expected a string")),
    }
}

fn string_predicate(actual: &Value, path: &str, pred: impl Fn(&str) -> bool) -> Result<Outcome, PatternError> {
    match actual.as_str() {
        Some(s) if pred(s) => Ok(Outcome::Match),
        Some(s) => Ok(mismatch(path, Value::Null, actual, format!("predicate failed for '{s}'"))),
        None => Ok(mismatch(path, Value::Null, actual, "expected a string")),
    }
}

fn string_len_op(token: &Token, actual: &Value, path: &str, pred: impl Fn(usize, usize) -> bool) -> Result<Outcome, PatternError> {
    let n = parse_usize(arg(token, path)?, path, &token.op)?;
    match actual.as_str() {
        Some(s) if pred(s.chars().count(), n) => Ok(Outcome::Match),
        Some(s) => Ok(mismatch(path, Value::from(n), actual, format!("string length {} failed check against {n}", s.chars().count()))),
        None => Ok(mismatch(path, Value::from(n), actual, "expected a string")),
    }
}

fn string_len_op_range(actual: &Value, path: &str, min: usize, max: usize) -> Result<Outcome, PatternError> {
    match actual.as_str() {
        Some(s) if s.chars().count() >= min && s.chars().count() <= max => Ok(Outcome::Match),
        Some(s) => Ok(mismatch(path, Value::String(format!("{min}:{max}")), actual, format!("string length {} not within {min}:{max}", s.chars().count()))),
        None => Ok(mismatch(path, Value::String(format!("{min}:{max}")), actual, "expected a string")),
    }
}

fn array_contains(token: &Token, actual: &Value, path: &str) -> Result<Outcome, PatternError> {
    let blob = arg(token, path)?;
    let array = actual.as_array().ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: "arrayContains requires an array actual value".to_string(),
    })?;

    // FIELD:VALUE form for arrays-of-objects; a bare scalar form otherwise.
    if let Some((field, expected_str)) = blob.split_once(':') {
        let expected: Value = serde_json::from_str(expected_str)
            .unwrap_or_else(|_| Value::String(expected_str.to_string()));
        let found = array.iter().any(|el| {
            matches!(super::path::resolve(el, field), super::path::Resolved::One(v) if v == expected)
        });
        if found {
            Ok(Outcome::Match)
        } else {
            Ok(mismatch(path, Value::String(blob.to_string()), actual, format!("no element with {field} == {expected_str}")))
        }
    } else {
        let expected: Value =
            serde_json::from_str(blob).unwrap_or_else(|_| Value::String(blob.to_string()));
        if array.contains(&expected) {
            Ok(Outcome::Match)
        } else {
            Ok(mismatch(path, expected, actual, "array does not contain expected element"))
        }
    }
}

fn numeric_cmp(token: &Token, actual: &Value, path: &str, pred: impl Fn(f64, f64) -> bool) -> Result<Outcome, PatternError> {
    let n = parse_f64(arg(token, path)?, path, &token.op)?;
    numeric_cmp_raw(actual, path, &token.op, |a| pred(a, n))
}

fn numeric_cmp_raw(actual: &Value, path: &str, op: &str, pred: impl Fn(f64) -> bool) -> Result<Outcome, PatternError> {
    match actual.as_f64() {
        Some(a) if pred(a) => Ok(Outcome::Match),
        Some(_) => Ok(mismatch(path, Value::String(op.to_string()), actual, format!("numeric check '{op}' failed"))),
        None => Ok(mismatch(path, Value::String(op.to_string()), actual, "expected a number")),
    }
}

fn date_cmp(
    token: &Token,
    actual: &Value,
    path: &str,
    pred: impl Fn(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) -> bool,
) -> Result<Outcome, PatternError> {
    let arg_str = arg(token, path)?;
    let bound = date::parse_str(arg_str).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: format!("invalid date argument '{arg_str}'"),
    })?;
    let actual_date = date::parse_value(actual).ok_or_else(|| PatternError {
        path: path.to_string(),
        reason: "actual value is not a parseable date".to_string(),
    })?;
    if pred(actual_date, bound) {
        Ok(Outcome::Match)
    } else {
        Ok(mismatch(path, Value::String(arg_str.to_string()), actual, format!("date check '{}' failed", token.op)))
    }
}
