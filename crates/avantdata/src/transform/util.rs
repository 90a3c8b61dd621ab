//! Small value helpers used when preparing documents.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

const SIZE_UNITS: [&str; 7] = [" bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"];

/// Splits `items` into at most `parts` ordered chunks whose sizes differ by at most one.
pub fn split_chunks<T>(items: Vec<T>, parts: usize) -> Vec<Vec<T>> {
    let len = items.len();
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let extra = len % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut iter = items.into_iter();
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

/// Concatenates nested sequences.
pub fn flatten<T>(lists: Vec<Vec<T>>) -> Vec<T> {
    lists.into_iter().flatten().collect()
}

/// Replaces empty values with null. Booleans are never considered empty.
pub fn remove_empty(value: Value) -> Value {
    let empty = match &value {
        Value::Null => true,
        Value::Bool(_) => false,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    };
    if empty {
        Value::Null
    } else {
        value
    }
}

/// Walks nested mappings along `path`. Empty segments are skipped.
pub fn get_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    path.iter()
        .map(AsRef::as_ref)
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
}

/// Uppercases the first letter of every alphabetic run and lowercases the rest.
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if prev_alpha {
            out.extend(ch.to_lowercase());
        } else {
            out.extend(ch.to_uppercase());
        }
        prev_alpha = ch.is_alphabetic();
    }
    out
}

/// Converts `snake_case` or `kebab-case` text into `camelCase`.
pub fn camel_case(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let spaced: String = s
        .chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect();
    let joined: String = title_case(&spaced).split(' ').collect();
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => joined,
    }
}

/// Human readable byte count, e.g. `706KB`.
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes;
    for (i, unit) in SIZE_UNITS.iter().enumerate() {
        if value < 1024 || i == SIZE_UNITS.len() - 1 {
            return format!("{}{}", value, unit);
        }
        value >>= 10;
    }
    format!("{}{}", value, SIZE_UNITS[SIZE_UNITS.len() - 1])
}

/// Interprets a textual literal as a typed scalar.
///
/// Integers, floats, booleans (`true`/`True`), null (`null`/`None`) and
/// JSON arrays/objects are recognized; anything else stays a string.
pub fn parse_scalar(text: &str) -> Value {
    let trimmed = text.trim();
    match trimmed {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "None" => return Value::Null,
        _ => {}
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return value;
        }
    }
    Value::String(text.to_string())
}

/// Parses common date/time layouts into milliseconds since the Unix epoch.
///
/// Values without an offset are read as UTC.
pub fn date_to_epoch_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp_millis());
        }
    }
    None
}

#[cfg(test)]
#[path = "util_tests.rs"]
mod tests;
