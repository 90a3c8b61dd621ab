//! Configuration types for the AvantData client.
//!
//! Every option has an explicit default. A full [`AvantConfig`] can be loaded
//! from YAML with environment overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`AVANTDATA_*`, nested keys split on `__`)
//! 2. Configuration file (YAML)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::download::csv::CsvOptions;
use crate::download::json::JsonOptions;
use crate::download::search::SearchOptions;
use crate::error::{Error, Result};
use crate::transfer::TransferOptions;
use crate::upload::bulk::BulkOptions;
use crate::upload::memory::MemoryOptions;
use crate::upload::template::TemplateOptions;

/// Connection settings shared by every AvantData API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the AvantData host (scheme + host, no API path).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Logical backend cluster, sent as the `cluster` header.
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Verify TLS certificates.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cluster: default_cluster(),
            verify_ssl: true,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at `base_url` with every other option defaulted.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not http(s), the cluster is empty
    /// or a timeout is zero.
    pub fn validate(&self) -> Result<()> {
        crate::client::validate_url(&self.base_url)?;
        if self.cluster.trim().is_empty() {
            return Err(Error::Config("cluster cannot be empty".to_string()));
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the documents of a transfer come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// CSV file or URL with a header row.
    #[serde(rename = "csv")]
    Csv(CsvOptions),
    /// One or more JSON documents.
    #[serde(rename = "json")]
    Json(JsonOptions),
    /// Scroll search against the AvantData search API.
    #[serde(rename = "search")]
    Search(SearchOptions),
}

impl SourceConfig {
    /// Short name of the source kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Csv(_) => "csv",
            SourceConfig::Json(_) => "json",
            SourceConfig::Search(_) => "search",
        }
    }
}

/// Full configuration for the `avantdata` CLI and [`crate::Transfer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvantConfig {
    /// API connection.
    #[serde(default)]
    pub client: ClientConfig,
    /// Document source. Optional when documents are supplied in code.
    #[serde(default)]
    pub source: Option<SourceConfig>,
    /// Transfer naming and steps.
    #[serde(default)]
    pub transfer: TransferOptions,
    /// Template generation and upload.
    #[serde(default)]
    pub template: TemplateOptions,
    /// Bulk upsert.
    #[serde(default)]
    pub bulk: BulkOptions,
    /// Memory store endpoints.
    #[serde(default)]
    pub memory: MemoryOptions,
}

impl AvantConfig {
    /// Load configuration from a YAML file, then apply `AVANTDATA_` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }
        let config = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("AVANTDATA_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (no environment overrides).
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::string(yaml))
            .extract()?;
        Ok(config)
    }

    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.transfer.validate()?;
        self.bulk.validate()?;
        self.template.validate()?;
        match &self.source {
            Some(SourceConfig::Csv(options)) => options.validate()?,
            Some(SourceConfig::Json(options)) => options.validate()?,
            Some(SourceConfig::Search(options)) => options.validate()?,
            None => {}
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://127.0.0.1".to_string()
}

fn default_cluster() -> String {
    "AvantData".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://127.0.0.1");
        assert_eq!(config.cluster, "AvantData");
        assert!(config.verify_ssl);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_rejects_bad_scheme() {
        let config = ClientConfig::new("ftp://10.0.0.1");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_rejects_empty_cluster() {
        let config = ClientConfig {
            cluster: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
client:
  base_url: https://192.168.102.133
  verify_ssl: false
source:
  type: json
  requests:
    - https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json
  select: vulnerabilities
transfer:
  name: kev
template:
  append: true
  custom:
    dateAdded: date
bulk:
  chunk_size: 500
  workers: 4
"#;
        let config = AvantConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.client.base_url, "https://192.168.102.133");
        assert!(!config.client.verify_ssl);
        assert_eq!(config.client.cluster, "AvantData");
        assert_eq!(config.transfer.name, "kev");
        assert!(config.template.append);
        assert_eq!(config.bulk.chunk_size, 500);
        assert_eq!(config.bulk.workers, 4);
        assert_eq!(config.source.as_ref().map(SourceConfig::kind), Some("json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_bulk_chunk_size() {
        let yaml = r#"
transfer:
  name: test
bulk:
  chunk_size: 0
"#;
        let config = AvantConfig::from_yaml(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "transfer:\n  name: from_file\nsource:\n  type: csv\n  url: ./data.csv"
        )
        .unwrap();

        let config = AvantConfig::from_file(file.path()).unwrap();
        assert_eq!(config.transfer.name, "from_file");
        assert_eq!(config.source.as_ref().map(SourceConfig::kind), Some("csv"));
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = AvantConfig::from_file(Path::new("/nonexistent/avantdata.yaml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_yaml_roundtrip_render() {
        let config = AvantConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("base_url"));
        assert!(yaml.contains("chunk_size"));
    }
}
