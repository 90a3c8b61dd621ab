//! JSON downloader for one or many URLs.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::document::Document;
use crate::download::{fetch, Downloaded, Downloader};
use crate::error::{Error, Result};
use crate::transform::{get_path, human_size};

/// Configuration for a JSON source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonOptions {
    /// URLs (or local paths) to read, in order. A single string is accepted.
    #[serde(deserialize_with = "one_or_many")]
    pub requests: Vec<String>,
    /// Key path narrowing each response to the interesting part.
    /// A string is split on `.`; a list is used as-is.
    #[serde(default, deserialize_with = "key_path")]
    pub select: Vec<String>,
    /// Request headers.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

fn default_headers() -> BTreeMap<String, String> {
    [
        ("Accept", "application/json, text/javascript, */*; q=0.01"),
        ("Accept-Language", "en-US"),
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:60.0) Gecko/20100101 Firefox/60.0",
        ),
        ("X-Requested-With", "XMLHttpRequest"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

fn key_path<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => split_path(&s),
        Some(OneOrMany::Many(v)) => v,
    })
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl JsonOptions {
    /// Options for a single URL with default headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            requests: vec![url.into()],
            select: Vec::new(),
            headers: default_headers(),
        }
    }

    /// Options for several URLs.
    pub fn many<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requests: urls.into_iter().map(Into::into).collect(),
            ..Self::new(String::new())
        }
    }

    /// Narrows every response to the value at a dotted key path.
    #[must_use]
    pub fn with_select(mut self, path: &str) -> Self {
        self.select = split_path(path);
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no URL is given or a header is malformed.
    pub fn validate(&self) -> Result<()> {
        if self.requests.is_empty() || self.requests.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::Config("json requests cannot be empty".to_string()));
        }
        self.header_map().map(|_| ())
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid header value for '{}': {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

/// Downloads JSON documents from one or more URLs.
pub struct JsonDownloader {
    options: JsonOptions,
    headers: HeaderMap,
    client: Client,
}

impl JsonDownloader {
    /// Creates a JSON downloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(options: JsonOptions, client: Client) -> Result<Self> {
        options.validate()?;
        let headers = options.header_map()?;
        Ok(Self {
            options,
            headers,
            client,
        })
    }

    /// Reads a single URL into `downloaded`. The response status is recorded
    /// before the body is parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the body is not JSON or the
    /// key path is missing.
    pub async fn read_into(&self, url: &str, downloaded: &mut Downloaded) -> Result<usize> {
        info!("Reading {}", url);
        let fetched = match fetch(&self.client, url, self.headers.clone()).await {
            Ok(fetched) => fetched,
            Err(Error::Api { status, body }) => {
                downloaded.statuses.push(status);
                return Err(Error::Api { status, body });
            }
            Err(e) => return Err(e),
        };
        downloaded.statuses.extend(fetched.status);

        let body: Value = serde_json::from_slice(&fetched.body)?;
        let selected = get_path(&body, &self.options.select).ok_or_else(|| {
            Error::Extraction(format!(
                "key path '{}' not found",
                self.options.select.join(".")
            ))
        })?;
        let documents = collect_documents(selected.clone());
        let count = documents.len();
        info!(
            "{} with {}. {} documents read",
            fetched.status.map_or_else(|| "file".to_string(), |s| s.to_string()),
            human_size(fetched.body.len() as u64),
            count
        );
        downloaded.documents.extend(documents);
        Ok(count)
    }
}

#[async_trait]
impl Downloader for JsonDownloader {
    fn source_type(&self) -> &'static str {
        "json"
    }

    async fn download(&self) -> Downloaded {
        let mut downloaded = Downloaded::default();
        for url in &self.options.requests {
            if let Err(e) = self.read_into(url, &mut downloaded).await {
                warn!("Failed to read {}: {}", url, e);
            }
        }
        downloaded
    }
}

/// Turns a selected value into documents. A single mapping becomes a
/// one-element list; non-mapping elements are skipped.
fn collect_documents(selected: Value) -> Vec<Document> {
    let items = match selected {
        Value::Array(items) => items,
        other => vec![other],
    };
    let total = items.len();
    let documents: Vec<Document> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if documents.len() < total {
        warn!("{} non-object values skipped", total - documents.len());
    }
    documents
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
