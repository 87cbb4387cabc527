//! Entity deduplication by embedding similarity
//!
//! Ingestion produces near-duplicate graph entities (plural forms, spelling
//! variants, abbreviations). Curation embeds every entity, compares pairs
//! within the same kind and folds pairs above the merge threshold into one
//! node.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use super::extractor::EntityKind;
use super::graph::GraphStore;
use crate::llm::{cosine_similarity, EmbeddingClient};
use crate::Result;

/// Distance metric used for pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Cosine,
    Euclidean,
    Manhattan,
}

impl SimilarityMetric {
    /// Parse a metric name; unknown values fall back to Cosine.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "euclidean" => SimilarityMetric::Euclidean,
            "manhattan" | "cityblock" => SimilarityMetric::Manhattan,
            _ => SimilarityMetric::Cosine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Euclidean => "euclidean",
            SimilarityMetric::Manhattan => "manhattan",
        }
    }
}

/// Similarity in [0, 1]-ish range regardless of metric. Cosine is used
/// directly; distance metrics are converted with 1 / (1 + d).
pub fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    match metric {
        SimilarityMetric::Cosine => cosine_similarity(a, b),
        SimilarityMetric::Euclidean => {
            let d = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt();
            1.0 / (1.0 + d)
        }
        SimilarityMetric::Manhattan => {
            let d = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f32>();
            1.0 / (1.0 + d)
        }
    }
}

/// Entity with its curation-time embedding.
#[derive(Debug, Clone)]
pub struct EntityEmbedding {
    pub name: String,
    pub kind: EntityKind,
    pub embedding: Vec<f32>,
}

/// Pair of entities that look alike. `source` would be folded into `target`.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarCandidate {
    pub source: String,
    pub target: String,
    pub kind: EntityKind,
    pub similarity: f32,
}

/// One merge to perform.
#[derive(Debug, Clone, Serialize)]
pub struct MergePlan {
    pub source: String,
    pub target: String,
    pub kind: EntityKind,
    pub similarity: f32,
}

/// Curation outcome counters.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CurationReport {
    pub entities_scanned: usize,
    pub candidate_pairs: usize,
    pub merges_planned: usize,
    pub merges_applied: usize,
    /// Candidate pairs per entity kind
    pub by_kind: HashMap<String, usize>,
}

pub fn group_by_kind(entities: Vec<EntityEmbedding>) -> HashMap<EntityKind, Vec<EntityEmbedding>> {
    let mut groups: HashMap<EntityKind, Vec<EntityEmbedding>> = HashMap::new();
    for entity in entities {
        groups.entry(entity.kind).or_default().push(entity);
    }
    groups
}

/// Pairwise comparison within one kind group (upper triangle, i < j).
/// Returns pairs at or above `threshold`, most similar first.
pub fn similarity_candidates(
    group: &[EntityEmbedding],
    metric: SimilarityMetric,
    threshold: f32,
) -> Vec<SimilarCandidate> {
    let mut candidates = Vec::new();
    for i in 0..group.len() {
        for j in (i + 1)..group.len() {
            let score = similarity(metric, &group[i].embedding, &group[j].embedding);
            if score >= threshold {
                candidates.push(SimilarCandidate {
                    source: group[i].name.clone(),
                    target: group[j].name.clone(),
                    kind: group[i].kind,
                    similarity: score,
                });
            }
        }
    }
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Turn candidates into a merge plan. Candidates must be sorted by
/// similarity descending. An entity merged away cannot take part in a
/// later merge; a target may absorb several sources.
pub fn merge_plans(candidates: &[SimilarCandidate], merge_threshold: f32) -> Vec<MergePlan> {
    let mut consumed: HashSet<&str> = HashSet::new();
    let mut plans = Vec::new();

    for candidate in candidates {
        if candidate.similarity < merge_threshold {
            continue;
        }
        if consumed.contains(candidate.source.as_str())
            || consumed.contains(candidate.target.as_str())
        {
            continue;
        }
        consumed.insert(candidate.source.as_str());
        plans.push(MergePlan {
            source: candidate.source.clone(),
            target: candidate.target.clone(),
            kind: candidate.kind,
            similarity: candidate.similarity,
        });
    }

    plans
}

/// Execute merges against the graph. A failed merge is logged and skipped
/// so one bad pair does not abort the whole run.
pub async fn apply_merges(graph: &GraphStore, plans: &[MergePlan]) -> Result<usize> {
    let mut applied = 0;
    for plan in plans {
        match graph.merge_entities(&plan.source, &plan.target).await {
            Ok(()) => applied += 1,
            Err(err) => warn!(
                "Skipping merge {} -> {}: {}",
                plan.source, plan.target, err
            ),
        }
    }
    Ok(applied)
}

/// Full curation pass: embed all entities, find similar pairs per kind,
/// plan merges above `merge_threshold` and optionally apply them.
pub async fn curate(
    graph: &GraphStore,
    embedder: &EmbeddingClient,
    metric: SimilarityMetric,
    threshold: f32,
    merge_threshold: f32,
    apply: bool,
) -> Result<(CurationReport, Vec<SimilarCandidate>)> {
    let entities = graph.all_entities().await?;
    let mut report = CurationReport {
        entities_scanned: entities.len(),
        ..Default::default()
    };
    if entities.len() < 2 {
        return Ok((report, Vec::new()));
    }

    // Embeddings are recomputed from the current name and description so
    // merges from earlier runs are reflected.
    let texts: Vec<String> = entities
        .iter()
        .map(|e| {
            if e.description.is_empty() {
                e.name.clone()
            } else {
                format!("{}: {}", e.name, e.description)
            }
        })
        .collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    let mut embedded = Vec::new();
    for (entity, embedding) in entities.into_iter().zip(embeddings) {
        if embedding.is_empty() {
            continue;
        }
        embedded.push(EntityEmbedding {
            name: entity.name,
            kind: entity.kind,
            embedding,
        });
    }

    let mut candidates = Vec::new();
    for (kind, group) in group_by_kind(embedded) {
        let found = similarity_candidates(&group, metric, threshold);
        if !found.is_empty() {
            report.by_kind.insert(kind.as_str().to_string(), found.len());
        }
        candidates.extend(found);
    }
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    report.candidate_pairs = candidates.len();

    let plans = merge_plans(&candidates, merge_threshold);
    report.merges_planned = plans.len();

    if apply {
        report.merges_applied = apply_merges(graph, &plans).await?;
    }

    info!(
        "Curation: {} entities, {} candidates, {} planned, {} applied",
        report.entities_scanned,
        report.candidate_pairs,
        report.merges_planned,
        report.merges_applied
    );

    Ok((report, candidates))
}
