//! Document ingestion from files and directories

use std::path::Path;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use super::retriever::HybridRetriever;
use crate::metrics::record_ingested_chunks;
use crate::{Error, Result};

/// File pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "*.txt";

/// Documents per embedding batch during directory ingestion.
const INGEST_BATCH_SIZE: usize = 48;

/// Ingest a single document file. The file name becomes the source label.
pub async fn ingest_file(retriever: &HybridRetriever, path: &Path) -> Result<usize> {
    let text = tokio::fs::read_to_string(path).await?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let chunks = retriever.ingest_document(&source, &text).await?;
    record_ingested_chunks(chunks);
    info!("Ingested {} chunks from {}", chunks, path.display());
    Ok(chunks)
}

/// Ingest every file in `dir` whose name matches the glob `pattern`.
/// Files are read concurrently and indexed in batches.
pub async fn ingest_directory(
    retriever: &HybridRetriever,
    dir: &Path,
    pattern: &str,
) -> Result<usize> {
    if !dir.is_dir() {
        warn!("Knowledge directory {} does not exist", dir.display());
        return Ok(0);
    }

    let matcher = glob_to_regex(pattern)?;

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if matcher.is_match(&name) {
            paths.push((name, entry.path()));
        }
    }

    if paths.is_empty() {
        info!("No files matching '{}' in {}", pattern, dir.display());
        return Ok(0);
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    // Read all files concurrently, skipping unreadable ones
    let reads = join_all(paths.iter().map(|(name, path)| async move {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Some((name.clone(), text)),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                None
            }
        }
    }))
    .await;

    let docs: Vec<(String, String)> = reads.into_iter().flatten().collect();

    let mut total = 0;
    for batch in docs.chunks(INGEST_BATCH_SIZE) {
        let chunks = retriever.ingest_documents(batch).await?;
        debug!(
            "Batch of {} documents produced {} chunks",
            batch.len(),
            chunks
        );
        total += chunks;
    }

    record_ingested_chunks(total);
    info!(
        "Ingested {} chunks from {} files in {}",
        total,
        docs.len(),
        dir.display()
    );
    Ok(total)
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| Error::InvalidArgument(format!("bad pattern '{pattern}': {e}")))
}
