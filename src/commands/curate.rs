//! `curate` command: scan the entity graph for near-duplicates and
//! optionally merge them.

use anyhow::Result;

use crate::rag::{dedup, SimilarityMetric};
use crate::Config;

use super::AppComponents;

/// Run a similarity scan over all graph entities. Without `--apply` this
/// is a dry run that only reports the planned merges.
pub async fn run(
    config: &Config,
    threshold: Option<f32>,
    merge_threshold: Option<f32>,
    metric: Option<&str>,
    apply: bool,
) -> Result<()> {
    let components = AppComponents::init(config).await?;

    let metric = SimilarityMetric::parse(metric.unwrap_or(&config.curation_metric));
    let threshold = threshold.unwrap_or(config.candidate_threshold);
    let merge_threshold = merge_threshold.unwrap_or(config.merge_threshold);

    let (report, candidates) = dedup::curate(
        components.retriever.graph(),
        &components.embedder,
        metric,
        threshold,
        merge_threshold,
        apply,
    )
    .await?;

    println!(
        "Scanned {} entities: {} candidate pairs, {} merges planned, {} applied",
        report.entities_scanned,
        report.candidate_pairs,
        report.merges_planned,
        report.merges_applied
    );

    if !report.by_kind.is_empty() {
        let mut kinds: Vec<_> = report.by_kind.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            println!("  {}: {} candidate pairs", kind, count);
        }
    }

    if !candidates.is_empty() {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
    }

    if !apply && report.merges_planned > 0 {
        println!("Dry run: re-run with --apply to merge");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend_config() -> Config {
        let mut config = Config::defaults();
        config.vector_backend = "memory".to_string();
        config.graph_backend = "memory".to_string();
        config.openai_api_key = String::new();
        config
    }

    #[tokio::test]
    async fn dry_run_on_empty_graph() {
        let config = memory_backend_config();
        run(&config, None, None, None, false).await.unwrap();
    }

    #[tokio::test]
    async fn explicit_thresholds_and_metric_are_accepted() {
        let config = memory_backend_config();
        run(&config, Some(0.7), Some(0.95), Some("euclidean"), false)
            .await
            .unwrap();
    }
}
