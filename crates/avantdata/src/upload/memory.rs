//! Key/value memory store.
//!
//! Values are stored as JSON text and read back with `serde_json`; a value
//! that is not already a list is wrapped in one before storing.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::client::{handle_http_error, truncate_body, AvantClient};
use crate::error::{Error, Result};

/// Memory store endpoints and defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryOptions {
    /// Store endpoint.
    #[serde(default = "default_api_index")]
    pub api_index: String,
    /// Fetch endpoint.
    #[serde(default = "default_api_search")]
    pub api_search: String,
    /// Default time to live in seconds.
    #[serde(default = "default_expire")]
    pub expire: u64,
}

fn default_api_index() -> String {
    "/avantapi/2.0/avantData/avantMem/index".to_string()
}

fn default_api_search() -> String {
    "/avantapi/2.0/avantData/avantMem/search".to_string()
}

fn default_expire() -> u64 {
    3600
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            api_index: default_api_index(),
            api_search: default_api_search(),
            expire: default_expire(),
        }
    }
}

/// Wraps non-list values in a one-element list.
pub fn as_stored(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

/// Client for the memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    client: AvantClient,
    options: MemoryOptions,
}

impl MemoryStore {
    /// Creates a store client.
    pub fn new(client: AvantClient, options: MemoryOptions) -> Self {
        Self { client, options }
    }

    /// Stores `value` under `key`, never failing: errors are logged and
    /// give `None`. Otherwise returns the response status.
    pub async fn store(&self, key: &str, value: &Value, expire: Option<u64>) -> Option<u16> {
        match self.try_store(key, value, expire).await {
            Ok(status) => Some(status),
            Err(e) => {
                error!("Failed to store {} in memory: {}", key, e);
                None
            }
        }
    }

    /// Stores `value` under `key`, expiring after `expire` seconds (or the
    /// configured default). Returns the response status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn try_store(&self, key: &str, value: &Value, expire: Option<u64>) -> Result<u16> {
        let payload = json!({
            "key": key,
            "value": serde_json::to_string(&as_stored(value))?,
            "expire": expire.unwrap_or(self.options.expire),
        });
        let response = self.client.post(&self.options.api_index).json(&payload).send().await?;
        let status = response.status().as_u16();
        info!("Memory store response status for {} indexing: {}", key, status);
        if let Ok(body) = response.text().await {
            debug!("{}", truncate_body(&body));
        }
        Ok(status)
    }

    /// Fetches the value stored under `key`, never failing: errors are
    /// logged and give `None`, as does a missing key.
    pub async fn fetch(&self, key: &str) -> Option<Value> {
        match self.try_fetch(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to fetch {} from memory: {}", key, e);
                None
            }
        }
    }

    /// Fetches the value stored under `key`. `None` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures, an error status or a stored
    /// value that is not valid JSON.
    pub async fn try_fetch(&self, key: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .post(&self.options.api_search)
            .json(&json!({ "key": key }))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(handle_http_error(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }

        let response: Value = serde_json::from_str(&body)?;
        match stored_text(&response) {
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| Error::Extraction(format!("stored value for {} is not JSON: {}", key, e))),
            None => Ok(None),
        }
    }
}

/// Locates the stored JSON text in a fetch response: either the bare
/// string, a top-level `value`, or `value` under `data`.
fn stored_text(response: &Value) -> Option<&str> {
    response
        .as_str()
        .or_else(|| response.get("value").and_then(Value::as_str))
        .or_else(|| response.pointer("/data/value").and_then(Value::as_str))
}
