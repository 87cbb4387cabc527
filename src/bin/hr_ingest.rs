//! Standalone document ingestion entry point.
//!
//! Equivalent to `hr_assistant ingest`, for batch jobs that only load
//! documents into the knowledge base.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hr_assistant::{commands, Config};

#[derive(Parser)]
#[command(name = "hr_ingest")]
#[command(about = "Ingest documents into the HR knowledge base")]
struct Cli {
    /// Single file to ingest
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory of documents to ingest
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Filename pattern for directory ingestion
    #[arg(short, long, default_value = "*.txt")]
    pattern: String,

    /// Path to the YAML config
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("hr_assistant=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::new(),
    };

    commands::ingest::run(
        &config,
        cli.file.as_deref(),
        cli.directory.as_deref(),
        &cli.pattern,
    )
    .await
}
