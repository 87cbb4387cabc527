//! Hybrid retrieval over the vector index, entity graph and chunk KV store

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use super::chunker::{Chunk, Chunker};
use super::extractor::{Entity, EntityExtractor};
use super::graph::GraphStore;
use super::kv::{KvStore, StoredChunk};
use super::vector::{SearchFilter, VectorIndex, VectorRecord};
use crate::llm::EmbeddingClient;
use crate::{Config, Result};

/// Retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Combine vector similarity with graph boosts (default)
    Hybrid,
    /// Only vector similarity
    VectorOnly,
    /// Only graph/entity matching
    GraphOnly,
}

impl RetrievalMode {
    /// Parse a mode name; unknown values fall back to Hybrid.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "vector" | "naive" => RetrievalMode::VectorOnly,
            "graph" | "local" => RetrievalMode::GraphOnly,
            _ => RetrievalMode::Hybrid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Hybrid => "mix",
            RetrievalMode::VectorOnly => "vector",
            RetrievalMode::GraphOnly => "graph",
        }
    }
}

/// Single retrieved chunk with scoring detail.
#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub chunk_id: uuid::Uuid,
    pub text: String,
    pub source: String,
    pub score: f32,
    /// Chunk entities that also appear in the query
    pub matched_entities: Vec<String>,
    /// Graph neighbors of the chunk entities
    pub related_entities: Vec<String>,
}

/// Retrieval tuning knobs.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Chunk size (words)
    pub chunk_size: usize,
    /// Overlap between chunks (words)
    pub chunk_overlap: usize,
    /// Top-K vector candidates
    pub top_k: usize,
    /// Max related entities per chunk
    pub graph_depth: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            chunk_size: 128,
            chunk_overlap: 16,
            top_k: 8,
            graph_depth: 4,
        }
    }
}

impl RetrieverConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k,
            graph_depth: config.graph_depth,
        }
    }
}

/// Knowledge retriever combining vector search with entity graph boosts.
///
/// Documents are chunked, entities and co-occurrence relations go to the
/// graph, chunk embeddings to the vector index and chunk texts to the KV
/// store. Queries pull vector candidates and boost them by entity overlap.
pub struct HybridRetriever {
    config: RetrieverConfig,
    chunker: Chunker,
    extractor: EntityExtractor,
    embedder: Arc<EmbeddingClient>,
    vectors: VectorIndex,
    graph: GraphStore,
    kv: KvStore,
}

impl HybridRetriever {
    pub fn new(
        config: RetrieverConfig,
        embedder: Arc<EmbeddingClient>,
        vectors: VectorIndex,
        graph: GraphStore,
        kv: KvStore,
    ) -> Self {
        Self {
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            extractor: EntityExtractor::new(),
            config,
            embedder,
            vectors,
            graph,
            kv,
        }
    }

    /// Fully in-process retriever with deterministic embeddings
    /// (tests and offline runs).
    pub fn local(config: RetrieverConfig, embedding_dim: usize) -> Self {
        Self::new(
            config,
            Arc::new(EmbeddingClient::local(embedding_dim)),
            VectorIndex::in_memory(),
            GraphStore::in_memory(),
            KvStore::new(),
        )
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn embedder(&self) -> &EmbeddingClient {
        &self.embedder
    }

    pub fn chunk_count(&self) -> usize {
        self.kv.chunk_count()
    }

    pub async fn vector_count(&self) -> Result<u64> {
        self.vectors.count().await
    }

    /// Ingest one document (chunk -> extract -> graph -> embed -> index).
    pub async fn ingest_document(&self, source: &str, text: &str) -> Result<usize> {
        if text.trim().is_empty() {
            return Ok(0);
        }
        self.ingest_documents(&[(source.to_string(), text.to_string())])
            .await
    }

    /// Ingest multiple documents in one batch to minimize embedding calls.
    /// Returns the number of chunks indexed by this call.
    pub async fn ingest_documents(&self, docs: &[(String, String)]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }

        let mut pending: Vec<(Chunk, Vec<Entity>)> = Vec::new();

        for (source, text) in docs {
            if text.trim().is_empty() {
                continue;
            }
            let chunks = self.chunker.chunk(text, source.clone());
            if chunks.is_empty() {
                continue;
            }
            self.kv.insert_document(source.clone(), text.clone());

            for chunk in chunks {
                let (entities, relations) = self.extractor.extract(&chunk);
                for entity in &entities {
                    let description = snippet(&chunk.text, entity.position);
                    self.graph
                        .upsert_entity(&entity.normalized, entity.kind, &description, source)
                        .await?;
                }
                for relation in &relations {
                    self.graph
                        .add_relation(
                            &relation.from,
                            &relation.to,
                            &relation.relation_type,
                            relation.weight,
                        )
                        .await?;
                }
                pending.push((chunk, entities));
            }
        }

        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending
            .iter()
            .map(|(chunk, _)| chunk.text.clone())
            .collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let mut records = Vec::with_capacity(pending.len());
        for ((chunk, entities), embedding) in pending.into_iter().zip(embeddings) {
            let record =
                VectorRecord::new(chunk.text.clone(), chunk.source.clone()).with_id(chunk.id);
            records.push((record, embedding));
            self.kv.insert_chunk(
                chunk.id,
                StoredChunk {
                    text: chunk.text,
                    source: chunk.source,
                    entities: entities.into_iter().map(|e| e.normalized).collect(),
                },
            );
        }

        let stored = self.vectors.upsert(&records).await?;
        debug!("Indexed {} chunks", stored);
        Ok(stored)
    }

    /// Retrieve relevant chunks, best first.
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        mode: RetrievalMode,
    ) -> Result<Vec<RetrievalHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_entities: HashSet<String> =
            self.extractor.extract_keywords(query).into_iter().collect();

        let mut hits = match mode {
            RetrievalMode::GraphOnly => self.graph_candidates(&query_entities),
            _ => self.vector_candidates(query, limit).await?,
        };

        for hit in &mut hits {
            let entities = self
                .kv
                .chunk(&hit.chunk_id)
                .map(|c| c.entities)
                .unwrap_or_default();

            let matched: Vec<String> = entities
                .iter()
                .filter(|e| query_entities.contains(*e))
                .cloned()
                .collect();
            let related = self.related_entities(&entities).await?;

            let graph_score = if matched.is_empty() {
                related.len() as f32 * 0.01
            } else {
                matched.len() as f32 * 0.05 + related.len() as f32 * 0.01
            };

            hit.score = match mode {
                RetrievalMode::VectorOnly => hit.score,
                RetrievalMode::GraphOnly => graph_score,
                RetrievalMode::Hybrid => hit.score + graph_score,
            };
            hit.matched_entities = matched;
            hit.related_entities = related;
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        debug!("Retrieval returned {} hits for mode {}", hits.len(), mode.as_str());

        Ok(hits)
    }

    async fn vector_candidates(&self, query: &str, limit: usize) -> Result<Vec<RetrievalHit>> {
        let embedding = self.embedder.embed(query).await?;
        let candidates = self
            .vectors
            .search(
                &embedding,
                self.config.top_k.max(limit),
                &SearchFilter::default(),
            )
            .await?;

        Ok(candidates
            .into_iter()
            .map(|scored| RetrievalHit {
                chunk_id: scored.record.id,
                text: scored.record.text,
                source: scored.record.source,
                score: scored.score,
                matched_entities: Vec::new(),
                related_entities: Vec::new(),
            })
            .collect())
    }

    fn graph_candidates(&self, query_entities: &HashSet<String>) -> Vec<RetrievalHit> {
        self.kv
            .chunks_with_any_entity(query_entities)
            .into_iter()
            .map(|(id, stored)| RetrievalHit {
                chunk_id: id,
                text: stored.text,
                source: stored.source,
                score: 0.0,
                matched_entities: Vec::new(),
                related_entities: Vec::new(),
            })
            .collect()
    }

    /// Neighbors of the chunk entities, strongest accumulated weight first.
    async fn related_entities(&self, entities: &[String]) -> Result<Vec<String>> {
        let mut scores: HashMap<String, f32> = HashMap::new();
        for entity in entities {
            for (name, weight) in self.graph.neighbors(entity, self.config.graph_depth).await? {
                *scores.entry(name).or_insert(0.0) += weight;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(self.config.graph_depth);
        Ok(ranked.into_iter().map(|(name, _)| name).collect())
    }
}

/// Format hits as a numbered context block for the chat prompt.
pub fn build_context(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return crate::prompts::EMPTY_CONTEXT.to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] (source: {})\n{}", i + 1, hit.source, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Words around `position`, used as a short entity description.
fn snippet(text: &str, position: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = position.saturating_sub(4).min(words.len());
    let end = (position + 5).min(words.len());
    words[start..end].join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RetrieverConfig {
        RetrieverConfig {
            chunk_size: 8,
            chunk_overlap: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn retrieves_relevant_chunks_locally() {
        let rag = HybridRetriever::local(small_config(), 64);

        rag.ingest_document(
            "vacation.txt",
            "Urlaubsanspruch beträgt mindestens zwanzig Tage pro Jahr laut Bundesurlaubsgesetz.",
        )
        .await
        .unwrap();
        rag.ingest_document(
            "garden.txt",
            "Gardening on weekends helps people relax and enjoy nature.",
        )
        .await
        .unwrap();

        let hits = rag
            .retrieve(
                "Wie hoch ist der Urlaubsanspruch pro Jahr?",
                3,
                RetrievalMode::Hybrid,
            )
            .await
            .unwrap();

        assert!(!hits.is_empty());
        assert_eq!(hits[0].source, "vacation.txt");
    }

    #[tokio::test]
    async fn hybrid_mode_boosts_entity_matches() {
        let rag = HybridRetriever::local(small_config(), 64);
        rag.ingest_document("law.txt", "Das Arbeitszeitgesetz regelt Pausen und Ruhezeiten.")
            .await
            .unwrap();

        let hits = rag
            .retrieve("Was sagt das Arbeitszeitgesetz?", 1, RetrievalMode::Hybrid)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!(hits[0]
            .matched_entities
            .contains(&"arbeitszeitgesetz".to_string()));
    }

    #[tokio::test]
    async fn ingest_documents_skips_empty_and_counts_chunks() {
        let rag = HybridRetriever::local(
            RetrieverConfig {
                chunk_size: 2,
                chunk_overlap: 0,
                ..Default::default()
            },
            64,
        );

        let docs = vec![
            ("doc1".to_string(), "one two three four".to_string()),
            ("blank".to_string(), "   ".to_string()),
            ("doc2".to_string(), "five six".to_string()),
        ];

        let indexed = rag.ingest_documents(&docs).await.unwrap();
        assert_eq!(indexed, 3);
        assert_eq!(rag.chunk_count(), 3);
    }

    #[tokio::test]
    async fn ingest_counts_are_per_call() {
        let rag = HybridRetriever::local(
            RetrieverConfig {
                chunk_size: 2,
                chunk_overlap: 0,
                ..Default::default()
            },
            64,
        );

        let first = rag.ingest_document("a", "one two three four").await.unwrap();
        let second = rag.ingest_document("b", "five six").await.unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(rag.chunk_count(), 3);
    }

    #[tokio::test]
    async fn ingest_ignores_whitespace_only_texts() {
        let rag = HybridRetriever::local(RetrieverConfig::default(), 64);
        let added = rag.ingest_document("src", "   ").await.unwrap();

        assert_eq!(added, 0);
        assert_eq!(rag.chunk_count(), 0);
    }

    #[tokio::test]
    async fn ingest_documents_empty_vec_returns_zero() {
        let rag = HybridRetriever::local(RetrieverConfig::default(), 64);
        assert_eq!(rag.ingest_documents(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retrieve_from_empty_index_returns_empty() {
        let rag = HybridRetriever::local(RetrieverConfig::default(), 64);
        let hits = rag
            .retrieve("test query", 5, RetrievalMode::Hybrid)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn vector_only_ignores_graph_boost() {
        let rag = HybridRetriever::local(small_config(), 64);
        rag.ingest_document("doc", "Probezeit Regelung gilt sechs Monate")
            .await
            .unwrap();

        let vector_hits = rag
            .retrieve("Probezeit Regelung", 1, RetrievalMode::VectorOnly)
            .await
            .unwrap();
        let hybrid_hits = rag
            .retrieve("Probezeit Regelung", 1, RetrievalMode::Hybrid)
            .await
            .unwrap();

        assert!(!vector_hits.is_empty());
        // Same chunk, hybrid adds the entity-match boost on top
        assert!(hybrid_hits[0].score > vector_hits[0].score);
    }

    #[tokio::test]
    async fn graph_only_finds_chunks_by_entity() {
        let rag = HybridRetriever::local(small_config(), 64);
        rag.ingest_document("doc", "Betriebsrat Wahlen finden alle vier Jahre statt")
            .await
            .unwrap();

        let hits = rag
            .retrieve("Betriebsrat", 5, RetrievalMode::GraphOnly)
            .await
            .unwrap();

        assert!(!hits.is_empty());
        assert!(hits[0].matched_entities.contains(&"betriebsrat".to_string()));
    }

    #[tokio::test]
    async fn graph_only_without_entity_overlap_is_empty() {
        let rag = HybridRetriever::local(small_config(), 64);
        rag.ingest_document("doc", "Urlaubsanspruch Regelung")
            .await
            .unwrap();

        let hits = rag
            .retrieve("gehalt", 5, RetrievalMode::GraphOnly)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn retrieve_respects_limit() {
        let rag = HybridRetriever::local(
            RetrieverConfig {
                chunk_size: 2,
                chunk_overlap: 0,
                ..Default::default()
            },
            64,
        );
        rag.ingest_document("doc", "alpha beta gamma delta epsilon zeta eta theta")
            .await
            .unwrap();

        let hits = rag
            .retrieve("alpha", 2, RetrievalMode::Hybrid)
            .await
            .unwrap();
        assert!(hits.len() <= 2);
    }

    #[tokio::test]
    async fn zero_limit_short_circuits() {
        let rag = HybridRetriever::local(small_config(), 64);
        rag.ingest_document("doc", "some indexed text here")
            .await
            .unwrap();

        let hits = rag.retrieve("text", 0, RetrievalMode::Hybrid).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn mode_parse_and_names() {
        assert_eq!(RetrievalMode::parse("mix"), RetrievalMode::Hybrid);
        assert_eq!(RetrievalMode::parse("hybrid"), RetrievalMode::Hybrid);
        assert_eq!(RetrievalMode::parse("vector"), RetrievalMode::VectorOnly);
        assert_eq!(RetrievalMode::parse("naive"), RetrievalMode::VectorOnly);
        assert_eq!(RetrievalMode::parse("graph"), RetrievalMode::GraphOnly);
        assert_eq!(RetrievalMode::parse("local"), RetrievalMode::GraphOnly);
        assert_eq!(RetrievalMode::parse("anything"), RetrievalMode::Hybrid);

        assert_eq!(RetrievalMode::Hybrid.as_str(), "mix");
        assert_eq!(RetrievalMode::VectorOnly.as_str(), "vector");
        assert_eq!(RetrievalMode::GraphOnly.as_str(), "graph");
    }

    #[test]
    fn config_defaults() {
        let config = RetrieverConfig::default();
        assert_eq!(config.chunk_size, 128);
        assert_eq!(config.chunk_overlap, 16);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.graph_depth, 4);
    }

    #[test]
    fn build_context_numbers_hits() {
        let hits = vec![
            RetrievalHit {
                chunk_id: uuid::Uuid::new_v4(),
                text: "first chunk".to_string(),
                source: "a.txt".to_string(),
                score: 0.9,
                matched_entities: vec![],
                related_entities: vec![],
            },
            RetrievalHit {
                chunk_id: uuid::Uuid::new_v4(),
                text: "second chunk".to_string(),
                source: "b.txt".to_string(),
                score: 0.5,
                matched_entities: vec![],
                related_entities: vec![],
            },
        ];

        let context = build_context(&hits);
        assert!(context.contains("[1] (source: a.txt)\nfirst chunk"));
        assert!(context.contains("[2] (source: b.txt)\nsecond chunk"));
    }

    #[test]
    fn build_context_empty_placeholder() {
        assert_eq!(build_context(&[]), crate::prompts::EMPTY_CONTEXT);
    }

    #[test]
    fn snippet_windows_around_position() {
        let text = "a b c d e f g h i j";
        assert_eq!(snippet(text, 5), "b c d e f g h i j");
        assert_eq!(snippet(text, 0), "a b c d e");
        assert_eq!(snippet(text, 100), "");
        assert_eq!(snippet("", 0), "");
    }
}
