//! HR assistant CLI - main entry point
//!
//! Unified interface for serving the API, ingesting documents, asking
//! one-shot questions, and maintaining memories and the entity graph.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use hr_assistant::{commands, metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "hr_assistant")]
#[command(about = "HR assistant with hybrid retrieval and per-user memory", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Path to the YAML config (default: config.yml with built-in fallbacks)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/websocket API server
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ingest documents into the knowledge base
    Ingest {
        /// Single file to ingest
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory of documents to ingest
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Filename pattern for directory ingestion
        #[arg(short, long, default_value = "*.txt")]
        pattern: String,
    },

    /// Ask a single question from the command line
    Ask {
        /// The question to answer
        question: String,

        /// Retrieval mode: mix | vector | graph
        #[arg(short, long)]
        mode: Option<String>,

        /// Acting user id (defaults to config)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Manage per-user memories
    Memory {
        /// Action: store, search, list
        action: String,

        /// Fact text (store) or query (search)
        text: Option<String>,

        /// User the memories belong to (defaults to config)
        #[arg(short, long)]
        user: Option<String>,

        /// Maximum results for search
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Find and merge near-duplicate graph entities
    Curate {
        /// Candidate similarity threshold (defaults to config)
        #[arg(long)]
        threshold: Option<f32>,

        /// Merge similarity threshold (defaults to config)
        #[arg(long)]
        merge_threshold: Option<f32>,

        /// Similarity metric: cosine | euclidean | manhattan
        #[arg(long)]
        metric: Option<String>,

        /// Apply planned merges instead of reporting them
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Serve { .. } => "serve",
            Commands::Ingest { .. } => "ingest",
            Commands::Ask { .. } => "ask",
            Commands::Memory { .. } => "memory",
            Commands::Curate { .. } => "curate",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hr_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::new(),
    };

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, &config).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            commands::serve::run(config, host.as_deref(), port).await?;
        }
        Commands::Ingest {
            file,
            directory,
            pattern,
        } => {
            commands::ingest::run(config, file.as_deref(), directory.as_deref(), &pattern).await?;
        }
        Commands::Ask {
            question,
            mode,
            user,
        } => {
            commands::ask::run(config, &question, mode.as_deref(), user.as_deref()).await?;
        }
        Commands::Memory {
            action,
            text,
            user,
            limit,
        } => {
            commands::memory::run(config, &action, text.as_deref(), user.as_deref(), limit)
                .await?;
        }
        Commands::Curate {
            threshold,
            merge_threshold,
            metric,
            apply,
        } => {
            commands::curate::run(config, threshold, merge_threshold, metric.as_deref(), apply)
                .await?;
        }
    }

    Ok(())
}
