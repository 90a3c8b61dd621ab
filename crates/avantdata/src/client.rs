//! HTTP plumbing shared by the downloaders and uploaders.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::net::UdpSocket;
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Header carrying the logical backend cluster on every API call.
pub const CLUSTER_HEADER: &str = "cluster";

/// Longest response body kept in error messages and logs.
const MAX_BODY_IN_ERROR: usize = 512;

/// Creates a configured HTTP client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn create_http_client(verify_ssl: bool, timeout: Duration, connect_timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .danger_accept_invalid_certs(!verify_ssl)
        .build()?;
    Ok(client)
}

/// Validates that a base URL is http(s).
pub fn validate_url(url: &str) -> Result<()> {
    let has_valid_scheme = ["http://", "https://"].iter().any(|s| url.starts_with(s));
    if !has_valid_scheme {
        return Err(Error::Config(format!(
            "Invalid URL scheme in '{}'. Allowed: http, https",
            url
        )));
    }
    let host = url.split("://").nth(1).unwrap_or_default();
    if host.trim_matches('/').is_empty() {
        return Err(Error::Config(format!("Invalid URL format: {}", url)));
    }
    Ok(())
}

/// Joins a base URL and an API path with exactly one slash between them.
pub fn join_url(base: &str, api: &str) -> String {
    if api.is_empty() {
        return base.trim_end_matches('/').to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        api.trim_start_matches('/')
    )
}

/// Maps a failed response into an error.
pub fn handle_http_error(status: StatusCode, body: &str) -> Error {
    match status.as_u16() {
        429 => Error::RateLimit(60),
        code => Error::Api {
            status: code,
            body: truncate_body(body),
        },
    }
}

/// Shortens a response body for logs and errors.
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }
    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Returns `https://<ip>` for the interface used to reach the outside world.
///
/// No packet is sent: connecting a UDP socket only selects a route.
///
/// # Errors
///
/// Returns an error if no route is available.
pub fn detect_local_base_url() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    let ip = socket.local_addr()?.ip();
    debug!("Detected local address {}", ip);
    Ok(format!("https://{}", ip))
}

/// Client for the AvantData REST API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct AvantClient {
    http: Client,
    base_url: String,
    cluster: String,
}

impl AvantClient {
    /// Creates a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = create_http_client(
            config.verify_ssl,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cluster: config.cluster.clone(),
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cluster sent with every request.
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Underlying HTTP client, without the cluster header.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Absolute URL for an API path.
    pub fn url(&self, api: &str) -> String {
        join_url(&self.base_url, api)
    }

    /// GET request on an API path.
    pub fn get(&self, api: &str) -> RequestBuilder {
        self.http
            .get(self.url(api))
            .header(CLUSTER_HEADER, &self.cluster)
    }

    /// POST request on an API path.
    pub fn post(&self, api: &str) -> RequestBuilder {
        self.http
            .post(self.url(api))
            .header(CLUSTER_HEADER, &self.cluster)
    }

    /// PUT request on an API path.
    pub fn put(&self, api: &str) -> RequestBuilder {
        self.http
            .put(self.url(api))
            .header(CLUSTER_HEADER, &self.cluster)
    }
}
