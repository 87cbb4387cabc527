//! `ingest` command: load documents into the knowledge base.

use std::path::Path;

use anyhow::{bail, Result};

use crate::rag::{ingest_directory, ingest_file};
use crate::Config;

use super::AppComponents;

/// Ingest a single file or a directory of files matching `pattern`.
/// Exactly one of `file` / `directory` must be given.
pub async fn run(
    config: &Config,
    file: Option<&Path>,
    directory: Option<&Path>,
    pattern: &str,
) -> Result<()> {
    let components = AppComponents::init(config).await?;

    let chunks = match (file, directory) {
        (Some(path), None) => ingest_file(&components.retriever, path).await?,
        (None, Some(dir)) => ingest_directory(&components.retriever, dir, pattern).await?,
        (Some(_), Some(_)) => bail!("--file and --directory are mutually exclusive"),
        (None, None) => bail!("one of --file or --directory is required"),
    };

    let entities = components.retriever.graph().stats().await?;
    println!(
        "Ingested {} chunks ({} entities, {} relations in graph)",
        chunks, entities.entity_count, entities.relation_count
    );
    Ok(())
}
