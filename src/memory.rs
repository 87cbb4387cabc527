//! Per-user memory facts with semantic search

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::llm::EmbeddingClient;
use crate::metrics::record_memory_op;
use crate::rag::{SearchFilter, VectorIndex, VectorRecord};
use crate::Result;

/// Source label for memory records in the vector index.
const MEMORY_SOURCE: &str = "memory";

/// One remembered statement, stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: Uuid,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Memory fact with query similarity.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub fact: MemoryFact,
    pub score: f32,
}

/// Personalized memory over a vector index. Facts are embedded on store
/// and retrieved by similarity, always filtered to the owning user.
pub struct MemoryStore {
    embedder: Arc<EmbeddingClient>,
    vectors: VectorIndex,
    facts: DashMap<Uuid, MemoryFact>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<EmbeddingClient>, vectors: VectorIndex) -> Self {
        Self {
            embedder,
            vectors,
            facts: DashMap::new(),
        }
    }

    /// Fully in-process store with deterministic embeddings
    /// (tests and offline runs).
    pub fn local(embedding_dim: usize) -> Self {
        Self::new(
            Arc::new(EmbeddingClient::local(embedding_dim)),
            VectorIndex::in_memory(),
        )
    }

    pub async fn init(&self) -> Result<()> {
        self.vectors.init_collection().await
    }

    /// Remember a statement for a user.
    pub async fn store(&self, user_id: &str, text: &str) -> Result<MemoryFact> {
        let fact = MemoryFact {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };

        let embedding = self.embedder.embed(text).await?;
        let record = VectorRecord::new(text, MEMORY_SOURCE)
            .with_id(fact.id)
            .with_user(user_id);
        self.vectors.upsert(&[(record, embedding)]).await?;
        self.facts.insert(fact.id, fact.clone());

        record_memory_op("store");
        debug!(user_id = %user_id, "Stored memory fact {}", fact.id);
        Ok(fact)
    }

    /// Most similar memories of a user, best first.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self
            .vectors
            .search(&embedding, limit, &SearchFilter::new().user(user_id))
            .await?;

        record_memory_op("search");
        Ok(hits
            .into_iter()
            .map(|scored| ScoredMemory {
                fact: MemoryFact {
                    id: scored.record.id,
                    user_id: user_id.to_string(),
                    text: scored.record.text,
                    created_at: scored.record.created_at,
                },
                score: scored.score,
            })
            .collect())
    }

    /// All facts stored for a user in this process, oldest first.
    pub fn all_for_user(&self, user_id: &str) -> Vec<MemoryFact> {
        let mut facts: Vec<MemoryFact> = self
            .facts
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        facts.sort_by_key(|fact| fact.created_at);
        record_memory_op("list");
        facts
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }
}

/// Format memories as a numbered block for the chat prompt.
pub fn format_memories(memories: &[ScoredMemory]) -> String {
    if memories.is_empty() {
        return crate::prompts::EMPTY_MEMORIES.to_string();
    }
    memories
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, m.fact.text))
        .collect::<Vec<_>>()
        .join("\n")
}
