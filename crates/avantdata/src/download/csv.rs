//! CSV downloader with header-row dictionary semantics.

use ::csv::ReaderBuilder;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::document::Document;
use crate::download::{fetch, Downloaded, Downloader};
use crate::error::{Error, Result};
use crate::transform::parse_scalar;

/// Configuration for a CSV source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// http(s) URL, `file://` URI or local path.
    pub url: String,
    /// First line to keep (negative counts from the end).
    /// The header row is the first kept line.
    #[serde(default)]
    pub start: Option<i64>,
    /// Line to stop before (negative counts from the end).
    #[serde(default)]
    pub end: Option<i64>,
    /// Field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Convert cells to numbers/booleans/null where they parse as such.
    #[serde(default)]
    pub infer_types: bool,
}

fn default_delimiter() -> char {
    ','
}

impl CsvOptions {
    /// Options for `url` with defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            start: None,
            end: None,
            delimiter: default_delimiter(),
            infer_types: false,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is empty or the delimiter is not ASCII.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("csv url cannot be empty".to_string()));
        }
        if !self.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "csv delimiter must be ASCII, got '{}'",
                self.delimiter
            )));
        }
        Ok(())
    }
}

/// Downloads a CSV file as a list of documents keyed by the header row.
pub struct CsvDownloader {
    options: CsvOptions,
    client: Client,
}

impl CsvDownloader {
    /// Creates a CSV downloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(options: CsvOptions, client: Client) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, client })
    }

    /// Downloads and parses, surfacing the first error.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    pub async fn try_download(&self) -> Result<Downloaded> {
        info!("Reading {}", self.options.url);
        let fetched = fetch(&self.client, &self.options.url, HeaderMap::new()).await?;
        let text = decode_utf8_lossy(&fetched.body);
        let documents = parse_csv(&text, &self.options)?;
        Ok(Downloaded {
            documents,
            statuses: fetched.status.into_iter().collect(),
            total: None,
            took: 0,
        })
    }
}

#[async_trait]
impl Downloader for CsvDownloader {
    fn source_type(&self) -> &'static str {
        "csv"
    }

    async fn download(&self) -> Downloaded {
        match self.try_download().await {
            Ok(downloaded) => {
                info!("{} rows read from {}", downloaded.len(), self.options.url);
                downloaded
            }
            Err(e) => {
                warn!("Failed to read {}: {}", self.options.url, e);
                Downloaded::default()
            }
        }
    }
}

/// Decodes UTF-8, dropping any byte sequence that is not valid.
fn decode_utf8_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Resolves slice bounds against `len`, clamping like a slice expression.
fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let resolve = |index: i64| -> usize {
        if index < 0 {
            len.saturating_sub(index.unsigned_abs() as usize)
        } else {
            (index as usize).min(len)
        }
    };
    let from = start.map_or(0, resolve);
    let to = end.map_or(len, resolve);
    (from, to.max(from))
}

/// Parses CSV text whose first kept line is the header row.
fn parse_csv(text: &str, options: &CsvOptions) -> Result<Vec<Document>> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let (from, to) = slice_bounds(lines.len(), options.start, options.end);
    let selected = lines[from..to].concat();

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(options.delimiter as u8)
        .from_reader(selected.as_bytes());

    let headers = reader.headers()?.clone();
    let mut documents = Vec::new();
    let mut surplus_rows = 0usize;

    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            surplus_rows += 1;
        }
        let mut doc = Map::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let value = match record.get(i) {
                Some(cell) if options.infer_types => parse_scalar(cell),
                Some(cell) => Value::String(cell.to_string()),
                None => Value::Null,
            };
            doc.insert(header.to_string(), value);
        }
        documents.push(doc);
    }

    if surplus_rows > 0 {
        debug!("{} rows had more cells than headers; extra cells dropped", surplus_rows);
    }

    Ok(documents)
}

#[cfg(test)]
#[path = "csv_tests.rs"]
mod tests;
