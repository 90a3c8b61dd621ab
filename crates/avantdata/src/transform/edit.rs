//! Recursive key/value rewriting over nested mappings and sequences.
//!
//! An [`Editor`] holds three rewrite lists:
//!
//! - key rewrites, applied to every mapping key at every depth;
//! - value rewrites, applied to every scalar at every depth;
//! - per-key rewrites, applied to the scalar stored under a matching
//!   (already rewritten) key, after the value rewrites.
//!
//! A scalar that is null after rewriting is dropped from its mapping or
//! sequence. Nested containers keep their shape.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::document::Document;
use crate::error::Result;
use crate::transform::fan_out;

/// Function rewriting a scalar value. Returning `Value::Null` drops the entry.
pub type ValueFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Function rewriting a mapping key.
pub type KeyFn = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Ordered regex substitutions. Each pattern replaces all of its matches
/// before the next pattern runs; replacements use `$1`/`${name}` syntax.
#[derive(Debug, Clone)]
pub struct RegexRules {
    rules: Vec<(Regex, String)>,
}

impl RegexRules {
    /// Compiles `(pattern, replacement)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid regex.
    pub fn new<I, P, R>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        let rules = pairs
            .into_iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern.as_ref())?, replacement.into())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Applies every rule in order.
    pub fn apply(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, (regex, replacement)| {
                regex.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }

    /// True when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One rewrite step for scalar values.
#[derive(Clone)]
pub enum ValueRewrite {
    /// Arbitrary function.
    Func(ValueFn),
    /// Regex substitutions, applied to non-empty strings only.
    Regex(RegexRules),
}

impl ValueRewrite {
    /// Wraps a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        ValueRewrite::Func(Arc::new(f))
    }

    /// Compiles regex substitutions.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn regex<I, P, R>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        Ok(ValueRewrite::Regex(RegexRules::new(pairs)?))
    }

    fn apply(&self, value: Value) -> Value {
        match self {
            ValueRewrite::Func(f) => f(value),
            ValueRewrite::Regex(rules) => match value {
                Value::String(s) if !s.is_empty() && !rules.is_empty() => {
                    Value::String(rules.apply(&s))
                }
                other => other,
            },
        }
    }
}

impl fmt::Debug for ValueRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRewrite::Func(_) => f.write_str("Func(..)"),
            ValueRewrite::Regex(rules) => f.debug_tuple("Regex").field(rules).finish(),
        }
    }
}

/// One rewrite step for mapping keys.
#[derive(Clone)]
pub enum KeyRewrite {
    /// Arbitrary function.
    Func(KeyFn),
    /// Regex substitutions, applied to non-empty keys only.
    Regex(RegexRules),
}

impl KeyRewrite {
    /// Wraps a closure.
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        KeyRewrite::Func(Arc::new(f))
    }

    /// Compiles regex substitutions.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn regex<I, P, R>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        Ok(KeyRewrite::Regex(RegexRules::new(pairs)?))
    }

    /// Renames keys that exactly match an entry of `renames`.
    pub fn rename<I, K, V>(renames: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let renames: HashMap<String, String> = renames
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        KeyRewrite::func(move |key| renames.get(&key).cloned().unwrap_or(key))
    }

    fn apply(&self, key: String) -> String {
        match self {
            KeyRewrite::Func(f) => f(key),
            KeyRewrite::Regex(rules) if !key.is_empty() => rules.apply(&key),
            KeyRewrite::Regex(_) => key,
        }
    }
}

impl fmt::Debug for KeyRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRewrite::Func(_) => f.write_str("Func(..)"),
            KeyRewrite::Regex(rules) => f.debug_tuple("Regex").field(rules).finish(),
        }
    }
}

/// Stateless recursive editor.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    keys: Vec<KeyRewrite>,
    values: Vec<ValueRewrite>,
    items: HashMap<String, Vec<ValueRewrite>>,
}

impl Editor {
    /// Editor with no rewrites; only drops null scalars.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key rewrite step.
    #[must_use]
    pub fn key(mut self, rewrite: KeyRewrite) -> Self {
        self.keys.push(rewrite);
        self
    }

    /// Adds a value rewrite step.
    #[must_use]
    pub fn value(mut self, rewrite: ValueRewrite) -> Self {
        self.values.push(rewrite);
        self
    }

    /// Adds a rewrite step for scalars stored under `key`.
    #[must_use]
    pub fn item(mut self, key: impl Into<String>, rewrite: ValueRewrite) -> Self {
        self.items.entry(key.into()).or_default().push(rewrite);
        self
    }

    /// Edits any value. A top-level scalar only goes through the value rewrites.
    pub fn edit(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.edit_map(map)),
            Value::Array(items) => Value::Array(self.edit_seq(items)),
            scalar => self.rewrite_value(scalar),
        }
    }

    /// Edits a single document.
    pub fn edit_document(&self, document: Document) -> Document {
        self.edit_map(document)
    }

    /// Edits a list of values across `workers` threads, keeping order.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn edit_all(&self, values: Vec<Value>, workers: usize) -> Result<Vec<Value>> {
        fan_out(values, workers, |chunk| self.edit_seq(chunk))
    }

    /// Edits a list of documents across `workers` threads, keeping order.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn edit_documents(&self, documents: Vec<Document>, workers: usize) -> Result<Vec<Document>> {
        fan_out(documents, workers, |chunk| {
            chunk.into_iter().map(|doc| self.edit_map(doc)).collect()
        })
    }

    fn edit_map(&self, map: Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            let key = self.rewrite_key(key);
            match value {
                container @ (Value::Array(_) | Value::Object(_)) => {
                    out.insert(key, self.edit(container));
                }
                scalar => {
                    let mut value = self.rewrite_value(scalar);
                    if let Some(steps) = self.items.get(&key) {
                        value = steps.iter().fold(value, |v, step| step.apply(v));
                    }
                    if !value.is_null() {
                        out.insert(key, value);
                    }
                }
            }
        }
        out
    }

    fn edit_seq(&self, items: Vec<Value>) -> Vec<Value> {
        items
            .into_iter()
            .filter_map(|item| match item {
                container @ (Value::Array(_) | Value::Object(_)) => Some(self.edit(container)),
                scalar => Some(self.rewrite_value(scalar)).filter(|v| !v.is_null()),
            })
            .collect()
    }

    fn rewrite_key(&self, key: String) -> String {
        self.keys.iter().fold(key, |k, step| step.apply(k))
    }

    fn rewrite_value(&self, value: Value) -> Value {
        self.values.iter().fold(value, |v, step| step.apply(v))
    }
}

#[cfg(test)]
#[path = "edit_tests.rs"]
mod tests;
