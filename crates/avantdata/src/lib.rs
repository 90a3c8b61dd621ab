// Client library - pedantic lints relaxed for API ergonomics
#![allow(clippy::pedantic)]

//! # AvantData client
//!
//! `avantdata` downloads documents from CSV files, JSON feeds and the
//! AvantData search API, reshapes them, and uploads them back into
//! AvantData through its template and bulk upsert endpoints.
//!
//! ## Sources
//!
//! | Source | Reads | Notes |
//! |--------|-------|-------|
//! | CSV | http(s), `file://`, local path | Header row becomes the keys |
//! | JSON | One or many URLs | Optional key path selection |
//! | Search | `customSearch` + `scrollSearch` | Scroll pagination, bounded retry |
//!
//! ## Quick Start
//!
//! ```bash
//! # Download, template, bulk upsert
//! avantdata run --config transfer.yaml
//!
//! # Preview only
//! avantdata run --config transfer.yaml --dry-run
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! client:
//!   base_url: https://192.168.102.133
//!   verify_ssl: false
//!
//! source:
//!   type: json
//!   requests: https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json
//!   select: vulnerabilities
//!
//! transfer:
//!   name: kev
//!
//! template:
//!   append: true
//!   custom:
//!     dateAdded: date
//!
//! bulk:
//!   chunk_size: 1000
//!   workers: 4
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use avantdata::{AvantClient, ClientConfig, Transfer, TransferOptions};
//! use serde_json::json;
//!
//! # async fn demo() -> avantdata::Result<()> {
//! let client = AvantClient::new(&ClientConfig::new("https://192.168.102.133"))?;
//! let documents = vec![avantdata::as_document(json!({"testKey": "firstValue"})).unwrap_or_default()];
//! let stats = Transfer::new(client, TransferOptions::new("test"))?.run(documents).await?;
//! println!("{}", stats.bulk);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod document;
pub mod download;
pub mod error;
pub mod retry;
pub mod transfer;
pub mod transform;
pub mod upload;

pub use client::{detect_local_base_url, AvantClient};
pub use config::{AvantConfig, ClientConfig, SourceConfig};
pub use document::{as_document, document_id, generate_id, generate_id_str, Document};
pub use download::{create_downloader, Downloaded, Downloader};
pub use error::{Error, Result};
pub use retry::RetryConfig;
pub use transfer::{Transfer, TransferOptions, TransferStats};
pub use transform::{Editor, FieldAdder, KeyRewrite, ValueRewrite};
pub use upload::{BulkOutcome, BulkUploader, MemoryStore, Template, TemplateOutcome};
