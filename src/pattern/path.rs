//! Dotted/bracketed path resolution over `serde_json::Value`, standing in
//! for the prototype-chain navigation a JS implementation would use.
//!
//! Supports `a.b`, `a[0].b`, and wildcard expansion via `a[*].b` or
//! `a.*.b`. A step into a scalar with path remaining yields `None`, which
//! callers collapse into a precise `Mismatch` path.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parsed result of walking a path: either a single value, or — once a
/// wildcard step has fired — a collected array of values.
#[derive(Debug, Clone)]
pub enum Resolved {
    One(serde_json::Value),
    Many(Vec<serde_json::Value>),
    Missing,
}

pub fn resolve(root: &serde_json::Value, path: &str) -> Resolved {
    let steps = parse(path);
    walk(root, &steps)
}

fn parse(path: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    for raw_segment in path.split('.') {
        let mut rest = raw_segment;
        // Pull out a leading key up to the first '[', if any.
        if let Some(bracket_pos) = rest.find('[') {
            let key = &rest[..bracket_pos];
            if !key.is_empty() {
                steps.push(Step::Key(key.to_string()));
            }
            rest = &rest[bracket_pos..];
            while let Some(stripped) = rest.strip_prefix('[') {
                if let Some(close) = stripped.find(']') {
                    let inner = &stripped[..close];
                    if inner == "*" {
                        steps.push(Step::Wildcard);
                    } else if let Ok(index) = inner.parse::<usize>() {
                        steps.push(Step::Index(index));
                    }
                    rest = &stripped[close + 1..];
                } else {
                    break;
                }
            }
        } else if rest == "*" {
            steps.push(Step::Wildcard);
        } else if !rest.is_empty() {
            steps.push(Step::Key(rest.to_string()));
        }
    }
    steps
}

fn walk(value: &serde_json::Value, steps: &[Step]) -> Resolved {
    let Some((first, rest)) = steps.split_first() else {
        return Resolved::One(value.clone());
    };

    match first {
        Step::Key(key) => match value.get(key) {
            Some(next) => walk(next, rest),
            None => Resolved::Missing,
        },
        Step::Index(idx) => match value.get(idx) {
            Some(next) => walk(next, rest),
            None => Resolved::Missing,
        },
        Step::Wildcard => {
            let Some(array) = value.as_array() else {
                return Resolved::Missing;
            };
            let mut collected = Vec::with_capacity(array.len());
            for element in array {
                match walk(element, rest) {
                    Resolved::One(v) => collected.push(v),
                    Resolved::Many(vs) => collected.extend(vs),
                    Resolved::Missing => continue,
                }
            }
            Resolved::Many(collected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_dotted_path() {
        let v = json!({"a": {"b": 42}});
        match resolve(&v, "a.b") {
            Resolved::One(x) => assert_eq!(x, json!(42)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn indexed_path() {
        let v = json!({"a": [{"b": 1}, {"b": 2}]});
        match resolve(&v, "a[0].b") {
            Resolved::One(x) => assert_eq!(x, json!(1)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wildcard_expands_to_array() {
        let v = json!([{"b": 1}, {"b": 2}]);
        match resolve(&v, "[*].b") {
            Resolved::Many(xs) => assert_eq!(xs, vec![json!(1), json!(2)]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dotted_wildcard_matches_extract_field_law() {
        let v = json!({"tools": [{"name": "read_file"}, {"name": "write_file"}]});
        match resolve(&v, "tools.*.name") {
            Resolved::Many(xs) => assert_eq!(xs, vec![json!("read_file"), json!("write_file")]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_key_is_missing() {
        let v = json!({"a": 1});
        assert!(matches!(resolve(&v, "a.b"), Resolved::Missing));
    }

    #[test]
    fn step_into_scalar_is_missing() {
        let v = json!({"a": 1});
        assert!(matches!(resolve(&v, "a.b.c"), Resolved::Missing));
    }
}
