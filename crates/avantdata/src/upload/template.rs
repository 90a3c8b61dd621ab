//! Index template generation and upload.
//!
//! A [`Template`] is built from a document sample. Uploading checks whether
//! the template exists and then creates it, appends newly observed fields to
//! the remote mapping, or leaves it alone, depending on the options.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::client::{truncate_body, AvantClient};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::transform::util::title_case;
use crate::upload::schema::{diff, generate_properties, merge_fields, unify, Overrides, TypeConflict};

/// Template options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateOptions {
    /// Endpoint for reading a template (`{api}/{name}`).
    #[serde(default = "default_api")]
    pub api: String,
    /// Endpoint for creating or replacing a template.
    #[serde(default = "default_api_create")]
    pub api_create: String,
    /// Template order.
    #[serde(default = "default_order")]
    pub order: i64,
    /// Number of primary shards.
    #[serde(default = "default_shards")]
    pub shards: u32,
    /// Type overrides by field name.
    #[serde(default)]
    pub custom: Overrides,
    /// Index pattern the template applies to. Defaults to `{name}*`.
    #[serde(default)]
    pub template_name: Option<String>,
    /// Mapping name. Defaults to the template name.
    #[serde(default)]
    pub mapping_name: Option<String>,
    /// Alias. Defaults to the title-cased name with non-word characters removed.
    #[serde(default)]
    pub aliases: Option<String>,
    /// Always recreate the template.
    #[serde(default)]
    pub regenerate: bool,
    /// Add missing fields to an existing template.
    #[serde(default)]
    pub append: bool,
}

fn default_api() -> String {
    "/avantapi/avantData/template".to_string()
}

fn default_api_create() -> String {
    "/avantapi/avantData/template/create".to_string()
}

fn default_order() -> i64 {
    1
}

fn default_shards() -> u32 {
    2
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            api: default_api(),
            api_create: default_api_create(),
            order: default_order(),
            shards: default_shards(),
            custom: Overrides::new(),
            template_name: None,
            mapping_name: None,
            aliases: None,
            regenerate: false,
            append: false,
        }
    }
}

impl TemplateOptions {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the shard count is zero or an endpoint is empty.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(Error::Config("template shards must be greater than 0".to_string()));
        }
        if self.api.trim().is_empty() || self.api_create.trim().is_empty() {
            return Err(Error::Config("template endpoints cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Default alias for a template name: `my-logs.v2` becomes `MyLogsV2`.
pub fn default_alias(name: &str) -> String {
    title_case(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// What an upload did.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateOutcome {
    /// The template did not exist (or regeneration was requested) and was created.
    Created,
    /// The template exists and appending is off.
    AlreadyExists,
    /// New fields were merged into the remote mapping and re-submitted.
    Appended {
        /// Dotted paths of the added fields.
        new_fields: Vec<String>,
        /// Fields whose remote type disagrees with the sample.
        conflicts: Vec<TypeConflict>,
    },
    /// Appending found nothing new.
    Unchanged {
        /// Fields whose remote type disagrees with the sample.
        conflicts: Vec<TypeConflict>,
    },
    /// The API answered with an error status.
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The request could not be made or its response was unusable.
    Failed(String),
}

impl TemplateOutcome {
    /// True unless the API rejected the template or the request failed.
    pub fn is_success(&self) -> bool {
        !matches!(self, TemplateOutcome::Rejected { .. } | TemplateOutcome::Failed(_))
    }

    /// Short label for logs and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            TemplateOutcome::Created => "created",
            TemplateOutcome::AlreadyExists => "already exists",
            TemplateOutcome::Appended { .. } => "appended",
            TemplateOutcome::Unchanged { .. } => "unchanged",
            TemplateOutcome::Rejected { .. } => "rejected",
            TemplateOutcome::Failed(_) => "failed",
        }
    }
}

/// An index template generated from a document sample.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    options: TemplateOptions,
    sample: Document,
    data: Value,
}

impl Template {
    /// Builds a template from a sample of documents.
    pub fn from_documents(name: impl Into<String>, documents: &[Document], options: TemplateOptions) -> Self {
        Self::from_document(name, unify(documents), options)
    }

    /// Builds a template from a single representative document, used as-is.
    pub fn from_document(name: impl Into<String>, sample: Document, options: TemplateOptions) -> Self {
        let name = name.into();
        let properties = generate_properties(&sample, &options.custom, true);
        let data = build_payload(&name, &options, properties);
        Self {
            name,
            options,
            sample,
            data,
        }
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options in use.
    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Payload sent to the create endpoint. After an append this is the
    /// merged remote template.
    pub fn payload(&self) -> &Value {
        &self.data
    }

    /// Properties of the first mapping in the payload.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.data
            .pointer("/body/mappings")
            .and_then(Value::as_object)
            .and_then(|mappings| mappings.values().next())
            .and_then(|mapping| mapping.get("properties"))
            .and_then(Value::as_object)
    }

    /// Uploads the template, never failing: errors become
    /// [`TemplateOutcome::Failed`].
    pub async fn upload(&mut self, client: &AvantClient) -> TemplateOutcome {
        match self.try_upload(client).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to upload template {}: {}", self.name, e);
                TemplateOutcome::Failed(e.to_string())
            }
        }
    }

    /// Uploads the template.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures or an unreadable remote
    /// template.
    pub async fn try_upload(&mut self, client: &AvantClient) -> Result<TemplateOutcome> {
        let api = format!("{}/{}", self.options.api.trim_end_matches('/'), self.name);
        let response = client.get(&api).send().await?;
        let status = response.status();
        debug!("GET {} -> {}", api, status);

        if status.as_u16() == 404 || self.options.regenerate {
            info!("Uploading template {}", self.name);
            return self.create(client).await;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Template lookup for {} returned {}", self.name, status);
            return Ok(TemplateOutcome::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        if !self.options.append {
            info!("Template {} already exists", self.name);
            return Ok(TemplateOutcome::AlreadyExists);
        }

        let remote: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("Failed to parse template {}: {}", self.name, e)))?;
        self.append(client, remote).await
    }

    async fn append(&mut self, client: &AvantClient, remote: Map<String, Value>) -> Result<TemplateOutcome> {
        let Some((_, Value::Object(mut body))) = remote.into_iter().next() else {
            return Err(Error::Extraction(format!(
                "Template {} response has no template body",
                self.name
            )));
        };

        let local = generate_properties(&self.sample, &self.options.custom, false);
        let mut new_fields = Vec::new();
        let mut conflicts = Vec::new();

        if let Some(Value::Object(mappings)) = body.get_mut("mappings") {
            for mapping in mappings.values_mut() {
                let Value::Object(mapping) = mapping else {
                    continue;
                };
                let properties = mapping
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                let Value::Object(properties) = properties else {
                    continue;
                };
                let result = diff(properties, &local);
                merge_fields(properties, &result.additions);
                new_fields.extend(result.new_fields);
                conflicts.extend(result.conflicts);
            }
        }

        for conflict in &conflicts {
            warn!(
                "Field {} is {} in template {} but {} in the sample; keeping {}",
                conflict.field, conflict.remote, self.name, conflict.local, conflict.remote
            );
        }

        let order = body.remove("order").unwrap_or_else(|| json!(self.options.order));
        self.data = json!({
            "name": self.name,
            "order": order,
            "body": body,
        });

        if new_fields.is_empty() {
            info!("Nothing to append in template {}", self.name);
            return Ok(TemplateOutcome::Unchanged { conflicts });
        }

        info!("Appending keys {:?}", new_fields);
        match self.create(client).await? {
            TemplateOutcome::Created => Ok(TemplateOutcome::Appended { new_fields, conflicts }),
            other => Ok(other),
        }
    }

    async fn create(&self, client: &AvantClient) -> Result<TemplateOutcome> {
        let response = client.post(&self.options.api_create).json(&self.data).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!("{}", truncate_body(&body));

        if status.is_success() {
            Ok(TemplateOutcome::Created)
        } else {
            Ok(TemplateOutcome::Rejected {
                status: status.as_u16(),
                body: truncate_body(&body),
            })
        }
    }
}

/// Assembles the full create payload.
fn build_payload(name: &str, options: &TemplateOptions, properties: Document) -> Value {
    let template_name = options
        .template_name
        .clone()
        .unwrap_or_else(|| format!("{}*", name));
    let mapping_name = options.mapping_name.clone().unwrap_or_else(|| name.to_string());
    let alias = options.aliases.clone().unwrap_or_else(|| default_alias(name));

    let mut mappings = Map::new();
    mappings.insert(
        mapping_name,
        json!({
            "_all": {"norms": false, "enabled": true},
            "_size": {"enabled": true},
            "properties": properties
        }),
    );
    let mut aliases = Map::new();
    aliases.insert(alias, json!({}));

    json!({
        "name": name,
        "order": options.order,
        "body": {
            "template": template_name,
            "settings": {
                "index": {
                    "refresh_interval": "5s",
                    "analysis": {
                        "analyzer": {
                            "WS": {
                                "filter": ["lowercase"],
                                "type": "custom",
                                "tokenizer": "whitespace"
                            }
                        }
                    },
                    "number_of_shards": options.shards,
                    "number_of_replicas": "0"
                }
            },
            "mappings": mappings,
            "aliases": aliases
        }
    })
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
