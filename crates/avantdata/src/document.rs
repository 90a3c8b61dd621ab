//! Documents and content-derived identifiers.
//!
//! A [`Document`] is a JSON object whose keys keep their insertion order.
//! [`serde_json::Value`] is the closed value type used everywhere: scalars,
//! sequences (`Array`) and mappings (`Object`).

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use std::io;

/// A string-keyed mapping of heterogeneous values.
pub type Document = Map<String, Value>;

/// Hashes `text` with md5 and returns 32 lowercase hex characters.
pub fn generate_id_str(text: &str) -> String {
    hex::encode(Md5::digest(text.as_bytes()))
}

/// Deterministic id for any value.
///
/// Strings are hashed as-is. Every other value is first rendered with
/// [`to_compat_json`], so ids match the ones other AvantData clients
/// already store.
pub fn generate_id(value: &Value) -> String {
    match value {
        Value::String(text) => generate_id_str(text),
        other => generate_id_str(&to_compat_json(other)),
    }
}

/// Id of a whole document.
pub fn document_id(document: &Document) -> String {
    generate_id_str(&to_compat_json(document))
}

/// Renders a value as JSON text using `", "` / `": "` separators and
/// `\uXXXX` escapes for every non-ASCII character.
pub fn to_compat_json<T: Serialize + ?Sized>(value: &T) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, CompatFormatter);
    // Serializing a `Value` or `Map` into a Vec cannot fail.
    if value.serialize(&mut serializer).is_err() {
        return String::new();
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Spaced separators, ASCII-only output, floats in shortest repr form.
struct CompatFormatter;

impl Formatter for CompatFormatter {
    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(float_repr(value).as_bytes())
    }

    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\x7f' {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Shortest round-trip text of a float. Decimal exponents from -4 to 15
/// print in fixed notation with at least one fractional digit; the rest
/// print as `1.5e-07` / `1e+20`.
fn float_repr(value: f64) -> String {
    if !value.is_finite() {
        return "null".to_string();
    }
    // `{:e}` yields the shortest digits, e.g. "-1.5e-7" or "1e20"
    let sci = format!("{:e}", value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if (-4..16).contains(&exp) {
        if exp < 0 {
            let zeros = "0".repeat((-exp - 1) as usize);
            return format!("{}0.{}{}", sign, zeros, digits);
        }
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            let zeros = "0".repeat(int_len - digits.len());
            return format!("{}{}{}.0", sign, digits, zeros);
        }
        let (int_part, frac_part) = digits.split_at(int_len);
        return format!("{}{}.{}", sign, int_part, frac_part);
    }

    let (first, rest) = digits.split_at(1);
    let exp_sign = if exp < 0 { '-' } else { '+' };
    if rest.is_empty() {
        format!("{}{}e{}{:02}", sign, first, exp_sign, exp.abs())
    } else {
        format!("{}{}.{}e{}{:02}", sign, first, rest, exp_sign, exp.abs())
    }
}

/// Builds a [`Document`] from a JSON value, returning `None` for non-objects.
pub fn as_document(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
#[path = "document_tests.rs"]
mod tests;
