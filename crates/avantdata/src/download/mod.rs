//! Downloaders that turn CSV files, JSON feeds and search results into
//! lists of [`Document`]s.
//!
//! Downloading never fails: transport errors, bad statuses and unparsable
//! bodies are logged and yield an empty (or partial) [`Downloaded`].

pub mod csv;
pub mod json;
pub mod search;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::path::PathBuf;
use tracing::debug;

use crate::client::{handle_http_error, AvantClient};
use crate::config::SourceConfig;
use crate::document::Document;
use crate::error::Result;

pub use self::csv::{CsvDownloader, CsvOptions};
pub use self::json::{JsonDownloader, JsonOptions};
pub use self::search::{SearchDownloader, SearchOptions};

/// Documents fetched from a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Downloaded {
    /// Documents in source order.
    pub documents: Vec<Document>,
    /// HTTP status of each request made (local files record none).
    pub statuses: Vec<u16>,
    /// Total matches reported by the source, when it reports one.
    pub total: Option<u64>,
    /// Accumulated server-side processing time in milliseconds.
    pub took: u64,
}

impl Downloaded {
    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when nothing was downloaded.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Source of documents.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Source type name for logs.
    fn source_type(&self) -> &'static str;

    /// Fetches everything the source offers.
    async fn download(&self) -> Downloaded;
}

/// Creates a downloader for the given source.
///
/// # Errors
///
/// Returns an error if the source configuration is invalid or an HTTP
/// client cannot be built.
pub fn create_downloader(config: &SourceConfig, client: &AvantClient) -> Result<Box<dyn Downloader>> {
    match config {
        SourceConfig::Csv(options) => Ok(Box::new(CsvDownloader::new(
            options.clone(),
            client.http().clone(),
        )?)),
        SourceConfig::Json(options) => Ok(Box::new(JsonDownloader::new(
            options.clone(),
            client.http().clone(),
        )?)),
        SourceConfig::Search(options) => Ok(Box::new(SearchDownloader::new(
            options.clone(),
            client.clone(),
        )?)),
    }
}

/// Raw bytes read from a URL or a local file.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub status: Option<u16>,
    pub body: Vec<u8>,
}

/// Where a location string points.
#[derive(Debug, PartialEq)]
pub(crate) enum Location {
    Remote(String),
    Local(PathBuf),
}

impl Location {
    pub(crate) fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            Location::Remote(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            Location::Local(PathBuf::from(path))
        } else {
            Location::Local(PathBuf::from(location))
        }
    }
}

/// Reads an http(s) URL, a `file://` URI or a plain path.
pub(crate) async fn fetch(client: &Client, location: &str, headers: HeaderMap) -> Result<Fetched> {
    match Location::parse(location) {
        Location::Remote(url) => {
            let response = client.get(&url).headers(headers).send().await?;
            let status = response.status();
            debug!("GET {} -> {}", url, status);
            let body = response.bytes().await?;
            if !status.is_success() {
                return Err(handle_http_error(status, &String::from_utf8_lossy(&body)));
            }
            Ok(Fetched {
                status: Some(status.as_u16()),
                body: body.to_vec(),
            })
        }
        Location::Local(path) => {
            let body = tokio::fs::read(&path).await?;
            debug!("Read {} bytes from {}", body.len(), path.display());
            Ok(Fetched { status: None, body })
        }
    }
}
