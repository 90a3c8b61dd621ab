//! AvantData CLI
//!
//! Moves documents from CSV, JSON and search sources into AvantData.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use avantdata::download::{SearchDownloader, SearchOptions};
use avantdata::upload::MemoryOptions;
use avantdata::{
    create_downloader, detect_local_base_url, generate_id, generate_id_str, AvantClient, AvantConfig, ClientConfig,
    Downloader, MemoryStore, Template, Transfer,
};

#[derive(Parser)]
#[command(name = "avantdata")]
#[command(version)]
#[command(about = "Move documents from CSV, JSON and search sources into AvantData", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dry run mode (prepare documents, upload nothing)
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Connection flags for commands that work without a config file.
#[derive(clap::Args)]
struct Connection {
    /// AvantData base URL (defaults to this host's outbound address)
    #[arg(long, env = "AVANTDATA_BASE_URL")]
    base_url: Option<String>,

    /// Cluster header value
    #[arg(long, default_value = "AvantData")]
    cluster: String,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,
}

impl Connection {
    fn client(&self) -> anyhow::Result<AvantClient> {
        let base_url = match &self.base_url {
            Some(url) => url.clone(),
            None => detect_local_base_url()?,
        };
        let config = ClientConfig {
            cluster: self.cluster.clone(),
            verify_ssl: !self.insecure,
            ..ClientConfig::new(base_url)
        };
        Ok(AvantClient::new(&config)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transfer from a config file
    Run {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Documents per bulk request
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Bulk requests in flight at once
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Print the effective configuration
        #[arg(long)]
        print: bool,
    },

    /// Generate the template for a config's source
    Template {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Upload the template instead of printing it
        #[arg(long)]
        upload: bool,
    },

    /// Run a scroll search and write the hits as JSON
    Search {
        #[command(flatten)]
        connection: Connection,

        /// Index pattern
        #[arg(short, long, default_value = "*")]
        index: String,

        /// Query string hits must match
        #[arg(short, long, default_value = "GenerateTime:*")]
        must: String,

        /// Maximum number of hits
        #[arg(short, long)]
        limit: Option<usize>,

        /// Flatten hits to {id, type, index, ..._source}
        #[arg(long)]
        format: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the md5 id of a text (or of a JSON value with --json)
    Id {
        /// Text to hash
        text: String,

        /// Parse the text as JSON first
        #[arg(long)]
        json: bool,
    },

    /// Store or fetch values in the memory store
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Generate an example configuration
    Init {
        /// Source type (csv, json, search)
        #[arg(short, long)]
        source: String,

        /// Output file path
        #[arg(short, long, default_value = "transfer.yaml")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Store a JSON value under a key
    Store {
        #[command(flatten)]
        connection: Connection,

        /// Key
        #[arg(short, long)]
        key: String,

        /// JSON value
        #[arg(long)]
        value: String,

        /// Time to live in seconds
        #[arg(long)]
        expire: Option<u64>,
    },

    /// Fetch the value stored under a key
    Fetch {
        #[command(flatten)]
        connection: Connection,

        /// Key
        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Run {
            config,
            chunk_size,
            workers,
        }) => {
            run_transfer(&config, cli.dry_run, chunk_size, workers).await?;
        }
        Some(Commands::Validate { config, print }) => {
            validate_config(&config, print)?;
        }
        Some(Commands::Template { config, upload }) => {
            show_template(&config, upload).await?;
        }
        Some(Commands::Search {
            connection,
            index,
            must,
            limit,
            format,
            output,
        }) => {
            let options = SearchOptions {
                index,
                must,
                limit,
                format,
                ..Default::default()
            };
            run_search(&connection, options, output.as_deref()).await?;
        }
        Some(Commands::Id { text, json }) => {
            let id = if json {
                let value: Value = serde_json::from_str(&text)?;
                generate_id(&value)
            } else {
                generate_id_str(&text)
            };
            println!("{}", id);
        }
        Some(Commands::Memory { action }) => {
            run_memory(action).await?;
        }
        Some(Commands::Init { source, output }) => {
            generate_config(&source, &output)?;
        }
        None => {
            // Default: run a transfer if a config is provided
            if let Some(config) = cli.config {
                run_transfer(&config, cli.dry_run, None, None).await?;
            } else {
                eprintln!("Usage: avantdata --config <FILE> or avantdata <COMMAND>");
                eprintln!("Try 'avantdata --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_transfer(
    config_path: &Path,
    dry_run: bool,
    chunk_size: Option<usize>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let mut config = AvantConfig::from_file(config_path)?;

    if dry_run {
        config.transfer.dry_run = true;
    }
    if let Some(size) = chunk_size {
        config.bulk.chunk_size = size;
    }
    if let Some(n) = workers {
        config.bulk.workers = n;
    }

    config.validate()?;

    let stats = Transfer::run_config(&config).await?;

    println!("\n✅ Transfer Complete!");
    println!("   Downloaded: {}", stats.downloaded);
    if let Some(template) = &stats.template {
        println!("   Template:   {}", template.label());
    }
    println!("   Created:    {}", stats.bulk.created);
    println!("   Updated:    {}", stats.bulk.updated);
    println!("   Failed:     {}", stats.bulk.failed);
    if stats.bulk.chunk_failures > 0 {
        println!(
            "   Unsent:     {} ({} chunks failed)",
            stats.bulk.unsent, stats.bulk.chunk_failures
        );
    }
    println!("   Duration:   {:.2}s", stats.duration_secs);
    println!("   Throughput: {:.0} docs/sec", stats.throughput());

    Ok(())
}

fn validate_config(config_path: &Path, print: bool) -> anyhow::Result<()> {
    info!("Validating configuration from {:?}", config_path);

    let config = AvantConfig::from_file(config_path)?;
    config.validate()?;

    println!("✅ Configuration is valid!");
    println!("   Base URL: {}", config.client.base_url);
    println!(
        "   Source:   {}",
        config.source.as_ref().map_or("none", |s| s.kind())
    );
    println!("   Name:     {}", config.transfer.name);
    println!("   Chunks:   {} x {} workers", config.bulk.chunk_size, config.bulk.workers);

    if print {
        println!("\n{}", config.to_yaml()?);
    }

    Ok(())
}

async fn show_template(config_path: &Path, upload: bool) -> anyhow::Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = AvantConfig::from_file(config_path)?;
    config.validate()?;
    let source = config
        .source
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("configuration has no source"))?;

    let client = AvantClient::new(&config.client)?;
    let downloader = create_downloader(source, &client)?;
    let downloaded = downloader.download().await;
    info!("{} documents sampled", downloaded.len());

    let mut template = Template::from_documents(&config.transfer.name, &downloaded.documents, config.template.clone());

    if upload {
        let outcome = template.upload(&client).await;
        println!("Template {}: {}", template.name(), outcome.label());
        if !outcome.is_success() {
            anyhow::bail!("template upload failed: {:?}", outcome);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(template.payload())?);
    }

    Ok(())
}

async fn run_search(connection: &Connection, options: SearchOptions, output: Option<&Path>) -> anyhow::Result<()> {
    let client = connection.client()?;
    let downloader = SearchDownloader::new(options, client)?;
    let downloaded = downloader.download().await;

    let text = serde_json::to_string_pretty(&downloaded.documents)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            info!("{} documents written to {:?}", downloaded.len(), path);
        }
        None => println!("{}", text),
    }

    Ok(())
}

async fn run_memory(action: MemoryAction) -> anyhow::Result<()> {
    match action {
        MemoryAction::Store {
            connection,
            key,
            value,
            expire,
        } => {
            let value: Value = serde_json::from_str(&value)?;
            let store = MemoryStore::new(connection.client()?, MemoryOptions::default());
            let status = store.try_store(&key, &value, expire).await?;
            println!("Stored {} (status {})", key, status);
        }
        MemoryAction::Fetch { connection, key } => {
            let store = MemoryStore::new(connection.client()?, MemoryOptions::default());
            match store.try_fetch(&key).await? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    error!("Nothing stored under {}", key);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}

fn generate_config(source: &str, output: &Path) -> anyhow::Result<()> {
    let template = match source.to_lowercase().as_str() {
        "csv" => CSV_TEMPLATE,
        "json" => JSON_TEMPLATE,
        "search" => SEARCH_TEMPLATE,
        _ => {
            error!("Unknown source type: {}", source);
            eprintln!("Supported sources: csv, json, search");
            std::process::exit(1);
        }
    };

    // Example configs must stay loadable.
    AvantConfig::from_yaml(template)?;

    std::fs::write(output, template)?;
    println!("✅ Generated configuration: {:?}", output);
    println!("   Edit the file and run: avantdata run --config {:?}", output);

    Ok(())
}

const CSV_TEMPLATE: &str = r#"# AvantData transfer - CSV source
client:
  base_url: https://127.0.0.1
  cluster: AvantData
  verify_ssl: true

source:
  type: csv
  url: https://example.com/export.csv
  # start: 1          # skip leading lines before the header row
  # delimiter: ";"
  # infer_types: true

transfer:
  name: my_csv

template:
  append: true

bulk:
  chunk_size: 1000
  workers: 1
"#;

const JSON_TEMPLATE: &str = r#"# AvantData transfer - JSON source
client:
  base_url: https://127.0.0.1
  cluster: AvantData
  verify_ssl: true

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
    dueDate: date

bulk:
  chunk_size: 1000
  workers: 4
"#;

const SEARCH_TEMPLATE: &str = r#"# AvantData transfer - search source (copy between indices)
client:
  base_url: https://127.0.0.1
  cluster: AvantData
  verify_ssl: true

source:
  type: search
  index: "firewall-*"
  must: "GenerateTime:*"
  size: 5000
  scroll: 8m
  format: true
  # limit: 100000
  retry:
    max_retries: 3

transfer:
  name: firewall_copy

bulk:
  chunk_size: 1000
  workers: 2
"#;
