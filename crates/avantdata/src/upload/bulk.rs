//! Chunked bulk upsert.
//!
//! Documents are split into fixed-size chunks and each chunk is sent as one
//! `PUT {"body": [...]}`. With more than one worker, chunks are in flight
//! concurrently; every chunk's result is joined and folded into a single
//! [`BulkOutcome`] by the caller, so a failing chunk is logged and counted
//! without stopping the others.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::client::{handle_http_error, truncate_body, AvantClient};
use crate::document::Document;
use crate::error::{Error, Result};

/// Bulk upsert options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOptions {
    /// Bulk upsert endpoint.
    #[serde(default = "default_api")]
    pub api: String,
    /// Documents per request.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Chunks in flight at once.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Draw a progress bar on stderr.
    #[serde(default)]
    pub show_progress: bool,
}

fn default_api() -> String {
    "/avantapi/avantData/index/bulk/general/upsert".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_workers() -> usize {
    1
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            api: default_api(),
            chunk_size: default_chunk_size(),
            workers: default_workers(),
            show_progress: false,
        }
    }
}

impl BulkOptions {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk size or worker count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("bulk chunk_size must be greater than 0".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("bulk workers must be greater than 0".to_string()));
        }
        Ok(())
    }
}

/// Bulk response body.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

/// Per-document result, keyed by the operation performed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BulkItem {
    Index(BulkItemStatus),
    Create(BulkItemStatus),
    Update(BulkItemStatus),
    Delete(BulkItemStatus),
}

impl BulkItem {
    fn status(&self) -> &BulkItemStatus {
        match self {
            BulkItem::Index(s) | BulkItem::Create(s) | BulkItem::Update(s) | BulkItem::Delete(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<BulkItemError>,
}

#[derive(Debug, Deserialize)]
struct BulkItemError {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl BulkItemError {
    fn key(&self) -> String {
        self.reason
            .clone()
            .or_else(|| self.error_type.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Tallies for one chunk.
#[derive(Debug, Default)]
struct ChunkCounts {
    results: BTreeMap<String, u64>,
    errors: BTreeMap<String, u64>,
}

/// Aggregated result of a bulk upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// Documents submitted.
    pub total: u64,
    /// Documents the backend created.
    pub created: u64,
    /// Documents the backend updated.
    pub updated: u64,
    /// Documents the backend rejected. Always the sum of [`Self::errors`].
    pub failed: u64,
    /// Item results by name (`created`, `updated`, `noop`, ...).
    pub results: BTreeMap<String, u64>,
    /// Item failures by reason.
    pub errors: BTreeMap<String, u64>,
    /// Chunks sent.
    pub chunks: usize,
    /// Chunks whose request failed or whose response was unusable.
    pub chunk_failures: usize,
    /// Documents in failed chunks, with unknown fate.
    pub unsent: u64,
}

impl BulkOutcome {
    /// Documents created or updated.
    pub fn succeeded(&self) -> u64 {
        self.created + self.updated
    }

    fn absorb(&mut self, counts: ChunkCounts) {
        for (result, n) in counts.results {
            *self.results.entry(result).or_default() += n;
        }
        for (reason, n) in counts.errors {
            *self.errors.entry(reason).or_default() += n;
        }
        self.created = self.results.get("created").copied().unwrap_or_default();
        self.updated = self.results.get("updated").copied().unwrap_or_default();
        self.failed = self.errors.values().sum();
    }
}

impl fmt::Display for BulkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Created: {} / Updated: {} / Failed: {}>",
            self.created, self.updated, self.failed
        )
    }
}

/// Sends documents to the bulk upsert endpoint.
#[derive(Debug, Clone)]
pub struct BulkUploader {
    client: AvantClient,
    options: BulkOptions,
}

impl BulkUploader {
    /// Creates an uploader.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(client: AvantClient, options: BulkOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { client, options })
    }

    /// Options in use.
    pub fn options(&self) -> &BulkOptions {
        &self.options
    }

    /// Upserts every document. Chunk failures are logged and counted; this
    /// never fails.
    pub async fn upsert(&self, documents: &[Document]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        if documents.is_empty() {
            info!("Empty list");
            return outcome;
        }

        outcome.total = documents.len() as u64;
        info!("Total: {}", documents.len());

        let progress = create_progress_bar(outcome.total, self.options.show_progress);
        let chunks: Vec<&[Document]> = documents.chunks(self.options.chunk_size).collect();
        outcome.chunks = chunks.len();
        debug!(
            "{} chunks of up to {} documents over {} workers",
            chunks.len(),
            self.options.chunk_size,
            self.options.workers
        );

        let mut replies = stream::iter(chunks.into_iter().enumerate())
            .map(move |(index, chunk)| async move { (index, chunk.len(), self.send_chunk(chunk).await) })
            .buffer_unordered(self.options.workers);

        while let Some((index, size, reply)) = replies.next().await {
            progress.inc(size as u64);
            match reply {
                Ok(counts) => {
                    outcome.absorb(counts);
                    info!("Updated: {}, Created {}.", outcome.updated, outcome.created);
                }
                Err(e) => {
                    warn!("Chunk {} ({} documents) failed: {}", index, size, e);
                    outcome.chunk_failures += 1;
                    outcome.unsent += size as u64;
                }
            }
        }

        progress.finish_and_clear();

        for (reason, n) in &outcome.errors {
            warn!("{} failed. Reason: {}", n, reason);
        }
        info!(
            "{} successfully executed with {} failures",
            outcome.succeeded(),
            outcome.failed
        );
        outcome
    }

    async fn send_chunk(&self, chunk: &[Document]) -> Result<ChunkCounts> {
        let response = self
            .client
            .put(&self.options.api)
            .json(&json!({ "body": chunk }))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(handle_http_error(status, &text));
        }

        let parsed: BulkResponse = serde_json::from_str(&text).map_err(|e| {
            debug!("{}", truncate_body(&text));
            Error::Extraction(format!("Unreadable bulk response: {}", e))
        })?;

        let mut counts = ChunkCounts::default();
        for item in &parsed.items {
            let status = item.status();
            if let Some(result) = &status.result {
                *counts.results.entry(result.clone()).or_default() += 1;
            }
            if let Some(error) = &status.error {
                *counts.errors.entry(error.key()).or_default() += 1;
            }
        }
        if parsed.errors && counts.errors.is_empty() {
            debug!("Bulk response flagged errors without item details");
        }
        Ok(counts)
    }
}

fn create_progress_bar(total: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;
