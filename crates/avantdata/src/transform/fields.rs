//! Field injection.
//!
//! Added fields come first in each resulting document. The document's own
//! keys are written afterwards and override an added field with the same name.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::document::{document_id, Document};
use crate::error::Result;
use crate::transform::fan_out;

/// Value of an injected field.
#[derive(Clone)]
pub enum FieldValue {
    /// Same value for every document.
    Const(Value),
    /// Computed from the original document.
    Computed(Arc<dyn Fn(&Document) -> Value + Send + Sync>),
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Const(v) => f.debug_tuple("Const").field(v).finish(),
            FieldValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Adds a fixed set of fields to documents.
#[derive(Debug, Clone, Default)]
pub struct FieldAdder {
    fields: Vec<(String, FieldValue)>,
}

impl FieldAdder {
    /// Adder with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant field.
    #[must_use]
    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), FieldValue::Const(value.into())));
        self
    }

    /// Adds a field computed from each original document.
    #[must_use]
    pub fn computed<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        self.fields.push((name.into(), FieldValue::Computed(Arc::new(f))));
        self
    }

    /// Adds an `id` field holding the md5 id of each original document.
    #[must_use]
    pub fn content_id(self, name: impl Into<String>) -> Self {
        self.computed(name, |doc| Value::String(document_id(doc)))
    }

    /// Applies the fields to one document.
    pub fn apply_one(&self, document: Document) -> Document {
        let mut out = Map::with_capacity(self.fields.len() + document.len());
        for (name, value) in &self.fields {
            let value = match value {
                FieldValue::Const(v) => v.clone(),
                FieldValue::Computed(f) => f(&document),
            };
            out.insert(name.clone(), value);
        }
        out.extend(document);
        out
    }

    /// Applies the fields to every document.
    pub fn apply(&self, documents: Vec<Document>) -> Vec<Document> {
        documents.into_iter().map(|doc| self.apply_one(doc)).collect()
    }

    /// Applies the fields across `workers` threads, keeping order.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn apply_parallel(&self, documents: Vec<Document>, workers: usize) -> Result<Vec<Document>> {
        fan_out(documents, workers, |chunk| self.apply(chunk))
    }
}
