//! Transfer pipeline: download, template, prepare, bulk upsert.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::client::AvantClient;
use crate::config::{default_true, AvantConfig};
use crate::document::Document;
use crate::download::{create_downloader, Downloader};
use crate::error::{Error, Result};
use crate::transform::{Editor, FieldAdder, KeyRewrite};
use crate::upload::bulk::{BulkOptions, BulkOutcome, BulkUploader};
use crate::upload::template::{Template, TemplateOptions, TemplateOutcome};

/// Naming and steps of a transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Transfer name; also the template name.
    #[serde(default)]
    pub name: String,
    /// Document type. Defaults to the name.
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    /// Target index. Defaults to the name.
    #[serde(default)]
    pub index: Option<String>,
    /// Generate and upload a template before indexing.
    #[serde(default = "default_true")]
    pub template: bool,
    /// Threads used to prepare documents.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Prepare documents without uploading anything.
    #[serde(default)]
    pub dry_run: bool,
}

fn default_workers() -> usize {
    1
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            type_name: None,
            index: None,
            template: true,
            workers: default_workers(),
            dry_run: false,
        }
    }
}

impl TransferOptions {
    /// Options for a named transfer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or `workers` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("transfer name cannot be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("transfer workers must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Effective document type.
    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(&self.name)
    }

    /// Effective index.
    pub fn index(&self) -> &str {
        self.index.as_deref().unwrap_or(&self.name)
    }
}

/// Transfer statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// Documents received.
    pub downloaded: usize,
    /// Template upload result, when the step ran.
    pub template: Option<TemplateOutcome>,
    /// Bulk upsert result.
    pub bulk: BulkOutcome,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl TransferStats {
    /// Documents indexed per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.bulk.succeeded() as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Moves documents into AvantData under one name.
#[derive(Debug, Clone)]
pub struct Transfer {
    client: AvantClient,
    options: TransferOptions,
    template: TemplateOptions,
    bulk: BulkOptions,
}

impl Transfer {
    /// Creates a transfer with default template and bulk options.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(client: AvantClient, options: TransferOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            client,
            options,
            template: TemplateOptions::default(),
            bulk: BulkOptions::default(),
        })
    }

    /// Creates a transfer from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &AvantConfig) -> Result<Self> {
        config.validate()?;
        let client = AvantClient::new(&config.client)?;
        Ok(Self::new(client, config.transfer.clone())?
            .with_template(config.template.clone())
            .with_bulk(config.bulk.clone()))
    }

    /// Replaces the template options.
    #[must_use]
    pub fn with_template(mut self, options: TemplateOptions) -> Self {
        self.template = options;
        self
    }

    /// Replaces the bulk options.
    #[must_use]
    pub fn with_bulk(mut self, options: BulkOptions) -> Self {
        self.bulk = options;
        self
    }

    /// Transfer options.
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Client in use.
    pub fn client(&self) -> &AvantClient {
        &self.client
    }

    /// Renames clashing `id`/`type`/`index` keys to `{name}ID`, `{name}type`
    /// and `{name}index`, then adds the transfer's `type`, `index` and a
    /// content-derived `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn prepare(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        let name = &self.options.name;
        let editor = Editor::new().key(KeyRewrite::rename([
            ("id", format!("{}ID", name)),
            ("type", format!("{}type", name)),
            ("index", format!("{}index", name)),
        ]));
        let adder = FieldAdder::new()
            .constant("type", self.options.type_name())
            .constant("index", self.options.index())
            .content_id("id");

        let edited = editor.edit_documents(documents, self.options.workers)?;
        adder.apply_parallel(edited, self.options.workers)
    }

    /// Runs every step on documents already in memory.
    ///
    /// # Errors
    ///
    /// Returns an error only if preparing the documents fails; upload
    /// failures are reported in the statistics.
    pub async fn run(&self, documents: Vec<Document>) -> Result<TransferStats> {
        let start = Instant::now();
        let mut stats = TransferStats {
            downloaded: documents.len(),
            ..Default::default()
        };
        info!("Starting transfer {} with {} documents", self.options.name, documents.len());

        if self.options.template && !self.options.dry_run {
            let mut template = Template::from_documents(&self.options.name, &documents, self.template.clone());
            let outcome = template.upload(&self.client).await;
            info!("Template {}: {}", self.options.name, outcome.label());
            stats.template = Some(outcome);
        }

        let prepared = self.prepare(documents)?;

        if self.options.dry_run {
            info!("Dry run mode - {} documents prepared, nothing uploaded", prepared.len());
        } else {
            let uploader = BulkUploader::new(self.client.clone(), self.bulk.clone())?;
            stats.bulk = uploader.upsert(&prepared).await;
        }

        stats.duration_secs = start.elapsed().as_secs_f64();
        info!(
            "Transfer complete: {} downloaded, {} indexed, {} failed in {:.2}s ({:.0} docs/sec)",
            stats.downloaded,
            stats.bulk.succeeded(),
            stats.bulk.failed,
            stats.duration_secs,
            stats.throughput()
        );
        Ok(stats)
    }

    /// Downloads from `downloader`, then runs every step.
    ///
    /// # Errors
    ///
    /// See [`Transfer::run`].
    pub async fn run_from(&self, downloader: &dyn Downloader) -> Result<TransferStats> {
        info!("Downloading from {} source", downloader.source_type());
        let downloaded = downloader.download().await;
        self.run(downloaded.documents).await
    }

    /// Builds the downloader named in `config` and runs the transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no source or is invalid.
    pub async fn run_config(config: &AvantConfig) -> Result<TransferStats> {
        let transfer = Self::from_config(config)?;
        let source = config
            .source
            .as_ref()
            .ok_or_else(|| Error::Config("no source configured".to_string()))?;
        let downloader = create_downloader(source, &transfer.client)?;
        transfer.run_from(downloader.as_ref()).await
    }
}
