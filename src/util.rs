//! Value coercion helpers shared by the models and the client.

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{Il2Error, Result};

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})(?:\.(\d+))?(?:(Z|z)|([+-]\d{2}):?(\d{2}))$",
    )
    .expect("timestamp pattern is valid")
});

const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Borrow anything byte-like as a byte slice.
///
/// Strings are taken as their UTF-8 bytes. No base64 decoding happens here.
pub fn to_bytes<T: AsRef<[u8]> + ?Sized>(value: &T) -> Vec<u8> {
    value.as_ref().to_vec()
}

/// Parse a node timestamp such as `2020-02-26T23:17:03.0189753-03:00`.
///
/// The offset may be written as `±HH:MM`, `±HHMM` or `Z`. Fractional digits
/// past the sixth are dropped.
pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>> {
    let captures = TIMESTAMP_PATTERN
        .captures(text.trim())
        .ok_or_else(|| Il2Error::Format(format!("'{}' is not a valid timestamp", text)))?;

    let mut normalized = captures[1].to_string();
    if let Some(fraction) = captures.get(2) {
        let digits = fraction.as_str();
        normalized.push('.');
        normalized.push_str(&digits[..digits.len().min(6)]);
    }
    if captures.get(3).is_some() {
        normalized.push_str("+0000");
    } else {
        normalized.push_str(&captures[4]);
        normalized.push_str(&captures[5]);
    }

    DateTime::parse_from_str(&normalized, TIMESTAMP_PARSE_FORMAT)
        .map_err(|e| Il2Error::Format(format!("'{}' is not a valid timestamp: {}", text, e)))
}

/// Render a timestamp with microsecond precision and a `±HH:MM` offset.
pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.format(TIMESTAMP_WRITE_FORMAT).to_string()
}

/// Recursively drop object entries whose value is null.
///
/// Array elements are visited but never removed.
pub fn filter_null(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, filter_null(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(filter_null).collect()),
        other => other,
    }
}

/// Build a `?name=value&...` query string, skipping empty values.
pub fn build_query<K, V>(pairs: &[(K, Option<V>)]) -> String
where
    K: AsRef<str>,
    V: ToString,
{
    let parts: Vec<String> = pairs
        .iter()
        .filter_map(|(name, value)| {
            let value = value.as_ref()?.to_string();
            if value.is_empty() {
                None
            } else {
                Some(format!("{}={}", name.as_ref(), value))
            }
        })
        .collect();

    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}
