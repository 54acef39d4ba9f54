use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doks_core::config::DoksConfig;
use doks_infrastructure::ConfigStorage;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "doks")]
#[command(about = "DoksAI CLI - ask questions about your documents", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.config/doks/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the DoksAI API, overrides the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the API is reachable
    Health {
        /// Keep monitoring and print status changes until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Restrict retrieval to one uploaded document
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Start an interactive chat session
    Chat {
        /// Restrict retrieval to one uploaded document
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Upload a PDF for indexing
    Upload { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config, cli.api_url)?;
    tracing::debug!("Using API at {}", config.api.base_url);

    match cli.command {
        Commands::Health { watch } => commands::health::run(&config, watch).await?,
        Commands::Ask { question, doc_id } => {
            commands::ask::run(&config, &question, doc_id.as_deref()).await?
        }
        Commands::Chat { doc_id } => commands::chat::run(&config, doc_id.as_deref()).await?,
        Commands::Upload { path } => commands::upload::run(&config, &path).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>, api_url: Option<String>) -> Result<DoksConfig> {
    let storage = match path {
        Some(path) => ConfigStorage::new(path),
        None => ConfigStorage::default_location()?,
    };

    let mut config = storage
        .load_with_env()
        .with_context(|| format!("Failed to load config from {:?}", storage.path()))?;

    if let Some(api_url) = api_url {
        config.api.base_url = api_url;
        config.validate().context("Invalid --api-url")?;
    }

    Ok(config)
}
