//! Date parsing for the `date*` operator family.
//!
//! Accepts ISO-8601 (with or without time), `us-date` MM/DD/YYYY, and
//! numeric millisecond timestamps.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub fn parse_value(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => parse_str(s),
        serde_json::Value::Number(n) => n.as_i64().and_then(parse_timestamp_millis),
        _ => None,
    }
}

pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(ms) = s.parse::<i64>() {
        return parse_timestamp_millis(ms);
    }
    None
}

fn parse_timestamp_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Parses a `dateAge` spec like `5m`, `30s`, `2h`, `1d` into a `chrono::Duration`.
pub fn parse_age_spec(spec: &str) -> Option<chrono::Duration> {
    let (number_part, unit) = spec.split_at(spec.len().checked_sub(1)?);
    let amount: i64 = number_part.parse().ok()?;
    match unit {
        "s" => Some(chrono::Duration::seconds(amount)),
        "m" => Some(chrono::Duration::minutes(amount)),
        "h" => Some(chrono::Duration::hours(amount)),
        "d" => Some(chrono::Duration::days(amount)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Iso,
    IsoDate,
    UsDate,
    Timestamp,
}

pub fn parse_format_kind(s: &str) -> Option<FormatKind> {
    match s {
        "iso" => Some(FormatKind::Iso),
        "iso-date" => Some(FormatKind::IsoDate),
        "us-date" => Some(FormatKind::UsDate),
        "timestamp" => Some(FormatKind::Timestamp),
        _ => None,
    }
}

pub fn matches_format(value: &serde_json::Value, kind: FormatKind) -> bool {
    let s = match value {
        serde_json::Value::String(s) => s.as_str(),
        serde_json::Value::Number(_) => return matches!(kind, FormatKind::Timestamp) && value.as_i64().is_some(),
        _ => return false,
    };
    match kind {
        FormatKind::Iso => DateTime::parse_from_rfc3339(s).is_ok(),
        FormatKind::IsoDate => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        FormatKind::UsDate => NaiveDate::parse_from_str(s, "%m/%d/%Y").is_ok(),
        FormatKind::Timestamp => s.parse::<i64>().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_iso8601() {
        assert!(parse_value(&json!("2023-06-01T12:00:00Z")).is_some());
    }

    #[test]
    fn parses_iso_date_only() {
        assert!(parse_value(&json!("2023-06-01")).is_some());
    }

    #[test]
    fn parses_us_date() {
        assert!(parse_value(&json!("06/01/2023")).is_some());
    }

    #[test]
    fn parses_ms_timestamp() {
        assert!(parse_value(&json!(1_685_620_800_000i64)).is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_value(&json!("not a date")).is_none());
    }

    #[test]
    fn age_spec_units() {
        assert_eq!(parse_age_spec("5m"), Some(chrono::Duration::minutes(5)));
        assert_eq!(parse_age_spec("2h"), Some(chrono::Duration::hours(2)));
        assert_eq!(parse_age_spec("30s"), Some(chrono::Duration::seconds(30)));
        assert_eq!(parse_age_spec("1d"), Some(chrono::Duration::days(1)));
        assert_eq!(parse_age_spec("7x"), None);
    }
}
