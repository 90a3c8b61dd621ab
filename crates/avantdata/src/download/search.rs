//! Scroll-paginated search against the AvantData search API.
//!
//! The first page comes from the custom-search endpoint. While pages come
//! back full and fewer hits than the reported total have been collected,
//! the scroll endpoint is called with the cursor returned by the previous
//! response. Transient statuses re-issue the same cursor request under a
//! bounded [`RetryConfig`]; any other failure ends the loop and keeps what
//! was already collected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::client::{handle_http_error, AvantClient};
use crate::document::Document;
use crate::download::{Downloaded, Downloader};
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig};

/// Options for a scroll search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Index pattern to search.
    #[serde(default = "default_index")]
    pub index: String,
    /// Initial search endpoint.
    #[serde(default = "default_api_custom")]
    pub api_custom: String,
    /// Scroll continuation endpoint.
    #[serde(default = "default_api_scroll")]
    pub api_scroll: String,
    /// Requested page size.
    #[serde(default = "default_page_size")]
    pub size: usize,
    /// Largest page the backend returns, whatever `size` asks for.
    #[serde(default = "default_page_size")]
    pub max_size: usize,
    /// Scroll context keep-alive.
    #[serde(default = "default_scroll")]
    pub scroll: String,
    /// Query string every hit must match.
    #[serde(default = "default_must")]
    pub must: String,
    /// Query string no hit may match.
    #[serde(default = "default_must_not")]
    pub must_not: String,
    /// Range filter body.
    #[serde(default = "default_filter")]
    pub filter: Value,
    /// Field to sort on.
    #[serde(default = "default_sort")]
    pub sort: String,
    /// Sort order (`asc` or `desc`).
    #[serde(default = "default_order")]
    pub order: String,
    /// Optional aggregations body.
    #[serde(default)]
    pub aggregations: Option<Value>,
    /// Stop once this many hits are collected.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Flatten hits to `{id, type, index, ..._source}`.
    #[serde(default)]
    pub format: bool,
    /// Retry policy for transient statuses.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_index() -> String {
    "*".to_string()
}

fn default_api_custom() -> String {
    "/avantapi/avantData/search/customSearch".to_string()
}

fn default_api_scroll() -> String {
    "/avantapi/avantData/search/scrollSearch".to_string()
}

fn default_page_size() -> usize {
    5000
}

fn default_scroll() -> String {
    "8m".to_string()
}

fn default_must() -> String {
    "GenerateTime:*".to_string()
}

fn default_must_not() -> String {
    "GenerateTime:0".to_string()
}

fn default_filter() -> Value {
    json!({"GenerateTime": {"lte": "now"}})
}

fn default_sort() -> String {
    "GenerateTime".to_string()
}

fn default_order() -> String {
    "desc".to_string()
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            index: default_index(),
            api_custom: default_api_custom(),
            api_scroll: default_api_scroll(),
            size: default_page_size(),
            max_size: default_page_size(),
            scroll: default_scroll(),
            must: default_must(),
            must_not: default_must_not(),
            filter: default_filter(),
            sort: default_sort(),
            order: default_order(),
            aggregations: None,
            limit: None,
            format: false,
            retry: RetryConfig::default(),
        }
    }
}

impl SearchOptions {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero page size, an empty scroll keep-alive or
    /// an unknown sort order.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || self.max_size == 0 {
            return Err(Error::Config("search size must be greater than 0".to_string()));
        }
        if self.scroll.trim().is_empty() {
            return Err(Error::Config("search scroll cannot be empty".to_string()));
        }
        if !matches!(self.order.as_str(), "asc" | "desc") {
            return Err(Error::Config(format!(
                "search order must be 'asc' or 'desc', got '{}'",
                self.order
            )));
        }
        if self.limit == Some(0) {
            return Err(Error::Config("search limit must be greater than 0".to_string()));
        }
        self.retry.validate()
    }

    /// Page length at which another page may follow.
    fn full_page(&self) -> usize {
        self.size.min(self.max_size)
    }
}

/// Initial search request.
#[derive(Debug, Serialize)]
struct CustomSearchRequest<'a> {
    index: &'a str,
    scroll: &'a str,
    body: SearchBody<'a>,
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    size: usize,
    query: Value,
    sort: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aggs: Option<&'a Value>,
}

/// Scroll continuation request.
#[derive(Debug, Serialize)]
struct ScrollRequest<'a> {
    scroll: &'a str,
    scroll_id: &'a str,
}

/// One page of results.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    #[serde(default)]
    took: Value,
    hits: HitsContainer,
    #[serde(default)]
    aggregations: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct HitsContainer {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<Document>,
}

/// `hits.total` is a bare count on older backends and `{"value": n}` on newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Count(n) | TotalHits::Object { value: n } => *n,
        }
    }
}

/// Accumulated result of a scroll search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    /// Raw hits in the order received.
    pub hits: Vec<Document>,
    /// Total matches reported by the first page.
    pub total: Option<u64>,
    /// Sum of the server-reported `took` of every page.
    pub took: u64,
    /// Pages successfully received.
    pub pages: usize,
    /// Aggregations from the first page.
    pub aggregations: Option<Value>,
    /// Last cursor returned by the backend.
    pub scroll_id: Option<String>,
}

/// Scroll-search downloader.
pub struct SearchDownloader {
    options: SearchOptions,
    client: AvantClient,
}

impl SearchDownloader {
    /// Creates a search downloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid.
    pub fn new(options: SearchOptions, client: AvantClient) -> Result<Self> {
        options.validate()?;
        Ok(Self { options, client })
    }

    /// Options in use.
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Builds the initial query document.
    fn build_query(&self) -> CustomSearchRequest<'_> {
        let o = &self.options;
        let mut sort = Map::new();
        sort.insert(o.sort.clone(), json!({"order": o.order}));
        CustomSearchRequest {
            index: &o.index,
            scroll: &o.scroll,
            body: SearchBody {
                size: o.size,
                query: json!({
                    "bool": {
                        "must": [{"query_string": {"query": o.must}}],
                        "must_not": [{"query_string": {"query": o.must_not}}],
                        "filter": {"range": o.filter}
                    }
                }),
                sort: vec![Value::Object(sort)],
                aggs: o.aggregations.as_ref(),
            },
        }
    }

    async fn post_page<B: Serialize>(&self, api: &str, body: &B) -> Result<SearchResponse> {
        let response = self.client.post(api).json(body).send().await?;
        let status = response.status();
        debug!("POST {} -> {}", api, status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(handle_http_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Failed to parse search response: {}", e)))
    }

    /// Runs the search to completion (or until the limit), never failing.
    pub async fn search(&self) -> SearchResult {
        let mut result = SearchResult::default();
        info!(
            "Searching {} in {}",
            self.options.index,
            self.client.base_url()
        );

        let query = self.build_query();
        let query = &query;
        let api_custom = self.options.api_custom.as_str();
        let first = match with_retry(&self.options.retry, "customSearch", move || {
            self.post_page(api_custom, query)
        })
        .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Failed to search {}: {}", self.options.index, e);
                return result;
            }
        };

        result.total = first.hits.total.as_ref().map(TotalHits::value);
        result.aggregations = first.aggregations.clone();
        if let Some(total) = result.total {
            info!("Total of {} documents found", total);
        }
        let mut last_len = self.absorb(&mut result, first);

        while self.wants_more(&result, last_len) {
            let Some(scroll_id) = result.scroll_id.clone() else {
                warn!("Backend returned no scroll id; stopping after {} hits", result.hits.len());
                break;
            };
            debug!(
                "{}/{} downloaded documents",
                result.hits.len(),
                result.total.unwrap_or_default()
            );

            let request = ScrollRequest {
                scroll: &self.options.scroll,
                scroll_id: &scroll_id,
            };
            let request = &request;
            let api_scroll = self.options.api_scroll.as_str();
            match with_retry(&self.options.retry, "scrollSearch", move || {
                self.post_page(api_scroll, request)
            })
            .await
            {
                Ok(page) => last_len = self.absorb(&mut result, page),
                Err(e) => {
                    warn!("Failed to scroll search {}: {}", self.options.index, e);
                    break;
                }
            }
        }

        if let Some(limit) = self.options.limit {
            result.hits.truncate(limit);
        }
        info!("{} downloaded documents", result.hits.len());
        result
    }

    /// Adds a page to the result and returns its hit count.
    fn absorb(&self, result: &mut SearchResult, page: SearchResponse) -> usize {
        if let Some(took) = page.took.as_u64() {
            result.took += took;
        }
        if page.scroll_id.is_some() {
            result.scroll_id = page.scroll_id;
        }
        let len = page.hits.hits.len();
        result.hits.extend(page.hits.hits);
        result.pages += 1;
        len
    }

    fn wants_more(&self, result: &SearchResult, last_len: usize) -> bool {
        let collected = result.hits.len();
        if last_len == 0 || last_len < self.options.full_page() {
            return false;
        }
        if self.options.limit.is_some_and(|limit| collected >= limit) {
            return false;
        }
        result.total.map_or(true, |total| (collected as u64) < total)
    }
}

/// Flattens a raw hit into `{id, type, index, ..._source}`.
pub fn format_hit(hit: Document) -> Document {
    let mut out = Map::new();
    for (from, to) in [("_id", "id"), ("_type", "type"), ("_index", "index")] {
        if let Some(value) = hit.get(from) {
            out.insert(to.to_string(), value.clone());
        }
    }
    if let Some(Value::Object(source)) = hit.get("_source") {
        out.extend(source.clone());
    }
    out
}

#[async_trait]
impl Downloader for SearchDownloader {
    fn source_type(&self) -> &'static str {
        "search"
    }

    async fn download(&self) -> Downloaded {
        let result = self.search().await;
        let documents = if self.options.format {
            result.hits.into_iter().map(format_hit).collect()
        } else {
            result.hits
        };
        Downloaded {
            documents,
            statuses: Vec::new(),
            total: result.total,
            took: result.took,
        }
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
