//! Key-value store for chunk texts and raw documents

use std::collections::HashSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chunk payload kept for context assembly and graph-only retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub text: String,
    pub source: String,
    /// Normalized entity names found in the chunk
    pub entities: Vec<String>,
}

/// In-process KV store for chunks and full documents.
#[derive(Debug, Default)]
pub struct KvStore {
    chunks: DashMap<Uuid, StoredChunk>,
    documents: DashMap<String, String>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_chunk(&self, id: Uuid, chunk: StoredChunk) {
        self.chunks.insert(id, chunk);
    }

    pub fn chunk(&self, id: &Uuid) -> Option<StoredChunk> {
        self.chunks.get(id).map(|entry| entry.clone())
    }

    pub fn insert_document(&self, label: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(label.into(), text.into());
    }

    pub fn document(&self, label: &str) -> Option<String> {
        self.documents.get(label).map(|entry| entry.clone())
    }

    /// Chunks mentioning at least one of the given normalized entity names.
    pub fn chunks_with_any_entity(&self, entities: &HashSet<String>) -> Vec<(Uuid, StoredChunk)> {
        self.chunks
            .iter()
            .filter(|entry| entry.entities.iter().any(|e| entities.contains(e)))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
