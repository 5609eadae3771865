//! Parsing of upstream error bodies (RPC error-detail convention).
//!
//! Bodies arrive as a bare object, an array wrapping one, or plain text with
//! JSON embedded somewhere inside. Everything here returns `Option` and never
//! fails loudly.

use serde_json::Value;

/// Parse a raw body. Tries a direct parse, then salvages the widest
/// `{ ... }` substring.
pub(super) fn parse_error_body(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Locate the `error` object of a parsed body.
pub(super) fn error_object(body: &Value) -> Option<&Value> {
    match body {
        Value::Array(items) => items.first().and_then(error_object),
        Value::Object(map) => match map.get("error") {
            Some(inner @ Value::Object(_)) => Some(inner),
            _ if map.contains_key("details") => Some(body),
            _ => None,
        },
        _ => None,
    }
}

/// `error.details`, or an empty slice.
pub(super) fn details(error: &Value) -> &[Value] {
    error
        .get("details")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `error.code` when it holds a plausible HTTP status.
pub(super) fn status_code(error: &Value) -> Option<u16> {
    error
        .get("code")
        .and_then(Value::as_u64)
        .filter(|c| (100..=599).contains(c))
        .and_then(|c| u16::try_from(c).ok())
}

/// Parse `<number>ms` or `<number>s` (fractional allowed) into whole milliseconds.
pub(super) fn parse_duration_ms(s: &str) -> Option<u64> {
    let s = s.trim();
    let (number, scale) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000.0)
    } else {
        return None;
    };
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let ms = (value * scale).round();
    if ms > u64::MAX as f64 {
        return None;
    }
    Some(ms as u64)
}

/// Parse an RFC 3339 timestamp into epoch milliseconds.
pub(super) fn parse_timestamp_ms(s: &str) -> Option<u64> {
    let dt = chrono::DateTime::parse_from_rfc3339(s.trim()).ok()?;
    u64::try_from(dt.timestamp_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_grammar() {
        assert_eq!(parse_duration_ms("0.5s"), Some(500));
        assert_eq!(parse_duration_ms("3s"), Some(3000));
        assert_eq!(parse_duration_ms("250ms"), Some(250));
        assert_eq!(parse_duration_ms("1.25s"), Some(1250));
        assert_eq!(parse_duration_ms("12"), None);
        assert_eq!(parse_duration_ms("-1s"), None);
        assert_eq!(parse_duration_ms("abcs"), None);
    }

    #[test]
    fn salvages_json_from_surrounding_text() {
        let raw = r#"HTTP 429 Too Many Requests: {"error":{"code":429,"details":[]}} (trace abc)"#;
        let v = parse_error_body(raw).expect("salvaged");
        let err = error_object(&v).expect("error object");
        assert_eq!(status_code(err), Some(429));
    }

    #[test]
    fn array_wrapped_body() {
        let raw = r#"[{"error":{"code":503,"details":[{"reason":"X"}]}}]"#;
        let v = parse_error_body(raw).unwrap();
        let err = error_object(&v).unwrap();
        assert_eq!(details(err).len(), 1);
    }

    #[test]
    fn garbage_yields_none() {
        assert!(parse_error_body("").is_none());
        assert!(parse_error_body("upstream exploded } {").is_none());
        assert!(parse_error_body("{not json}").is_none());
    }

    #[test]
    fn timestamp_parse() {
        assert_eq!(
            parse_timestamp_ms("1970-01-01T00:00:01.500Z"),
            Some(1500)
        );
        assert_eq!(parse_timestamp_ms("yesterday"), None);
    }
}
