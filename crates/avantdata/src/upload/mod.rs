//! Uploads to AvantData: index templates, bulk upserts and the memory store.

pub mod bulk;
pub mod memory;
pub mod schema;
pub mod template;

pub use bulk::{BulkOptions, BulkOutcome, BulkUploader};
pub use memory::{MemoryOptions, MemoryStore};
pub use schema::{FieldOverride, Overrides, SchemaDiff, TypeConflict};
pub use template::{Template, TemplateOptions, TemplateOutcome};
