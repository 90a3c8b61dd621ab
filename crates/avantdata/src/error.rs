//! Error types for the AvantData client.

use thiserror::Error;

/// Result type alias for AvantData operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to AvantData or preparing documents.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O error (file sources, config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid regular expression in a rewrite rule.
    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    /// The API answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// Rate limited by the API; value is the suggested wait in seconds.
    #[error("Rate limited, retry after {0}s")]
    RateLimit(u64),

    /// Response body did not have the expected shape.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Worker pool could not be built.
    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::Pool(err.to_string())
    }
}

impl Error {
    /// Returns true for transient failures worth retrying with the same request.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Error::RateLimit(_) => true,
            Error::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            Error::Io(_) => true,
            _ => false,
        }
    }
}
