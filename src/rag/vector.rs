//! Vector index with in-memory and Qdrant backends

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, FieldCondition, Filter, Match, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::llm::cosine_similarity;
use crate::{Config, Result};

/// Text snippet stored alongside its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub text: String,
    /// Originating document (file name or logical label)
    pub source: String,
    /// Owner for per-user collections, None for shared knowledge
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source: source.into(),
            user_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Search hit with similarity score.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Filter for vector search.
#[derive(Debug, Default, Clone)]
pub struct SearchFilter {
    pub user_id: Option<String>,
    pub source: Option<String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.source.is_none()
    }

    fn matches(&self, record: &VectorRecord) -> bool {
        let user_ok = self
            .user_id
            .as_ref()
            .map_or(true, |u| record.user_id.as_deref() == Some(u.as_str()));
        let source_ok = self
            .source
            .as_ref()
            .map_or(true, |s| &record.source == s);
        user_ok && source_ok
    }

    fn to_qdrant_filter(&self) -> Filter {
        let mut conditions = Vec::new();

        if let Some(user_id) = &self.user_id {
            conditions.push(
                FieldCondition {
                    key: "user_id".to_string(),
                    r#match: Some(Match {
                        match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                            user_id.clone(),
                        )),
                    }),
                    ..Default::default()
                }
                .into(),
            );
        }

        if let Some(source) = &self.source {
            conditions.push(
                FieldCondition {
                    key: "source".to_string(),
                    r#match: Some(Match {
                        match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keyword(
                            source.clone(),
                        )),
                    }),
                    ..Default::default()
                }
                .into(),
            );
        }

        Filter::must(conditions)
    }
}

/// Vector index with switchable backend.
pub enum VectorIndex {
    Qdrant(QdrantIndex),
    Memory(MemoryIndex),
}

impl VectorIndex {
    pub fn in_memory() -> Self {
        VectorIndex::Memory(MemoryIndex::default())
    }

    pub fn connect_qdrant(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(VectorIndex::Qdrant(QdrantIndex {
            client,
            collection: collection.to_string(),
            dimension,
        }))
    }

    /// Pick a backend from configuration.
    pub fn from_config(config: &Config, collection: &str, dimension: usize) -> Result<Self> {
        match config.vector_backend.as_str() {
            "memory" => Ok(Self::in_memory()),
            _ => {
                info!(url = %config.qdrant_url, collection = %collection, "Connecting to Qdrant");
                Self::connect_qdrant(&config.qdrant_url, collection, dimension)
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            VectorIndex::Qdrant(_) => "qdrant",
            VectorIndex::Memory(_) => "memory",
        }
    }

    /// Create the collection if it does not exist yet.
    pub async fn init_collection(&self) -> Result<()> {
        match self {
            VectorIndex::Qdrant(idx) => idx.init_collection().await,
            VectorIndex::Memory(_) => Ok(()),
        }
    }

    /// Insert records, replacing any existing point with the same id.
    pub async fn upsert(&self, records: &[(VectorRecord, Vec<f32>)]) -> Result<usize> {
        match self {
            VectorIndex::Qdrant(idx) => idx.upsert(records).await,
            VectorIndex::Memory(idx) => idx.upsert(records).await,
        }
    }

    /// Nearest records by cosine similarity, best first.
    pub async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>> {
        match self {
            VectorIndex::Qdrant(idx) => idx.search(embedding, limit, filter).await,
            VectorIndex::Memory(idx) => idx.search(embedding, limit, filter).await,
        }
    }

    pub async fn count(&self) -> Result<u64> {
        match self {
            VectorIndex::Qdrant(idx) => idx.count().await,
            VectorIndex::Memory(idx) => idx.count().await,
        }
    }
}

/// Vector index backed by Qdrant.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantIndex {
    async fn init_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await?;
        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            info!("Creating collection '{}'", self.collection);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                    ),
                )
                .await?;
        } else {
            debug!("Collection '{}' already exists", self.collection);
        }

        Ok(())
    }

    async fn upsert(&self, records: &[(VectorRecord, Vec<f32>)]) -> Result<usize> {
        let points: Vec<PointStruct> = records
            .iter()
            .filter(|(_, embedding)| !embedding.is_empty())
            .map(|(record, embedding)| {
                let mut payload: HashMap<String, QdrantValue> = HashMap::new();
                payload.insert("text".into(), record.text.clone().into());
                payload.insert("source".into(), record.source.clone().into());
                if let Some(user_id) = &record.user_id {
                    payload.insert("user_id".into(), user_id.clone().into());
                }
                payload.insert("created_at".into(), record.created_at.to_rfc3339().into());

                PointStruct::new(record.id.to_string(), embedding.clone(), payload)
            })
            .collect();

        if points.is_empty() {
            return Ok(0);
        }

        let count = points.len();
        debug!("Upserting {} points to '{}'", count, self.collection);
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await?;

        Ok(count)
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), limit as u64)
                .with_payload(true);
        if !filter.is_empty() {
            builder = builder.filter(filter.to_qdrant_filter());
        }

        let results = self.client.search_points(builder).await?;

        let hits = results
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point.id.and_then(|id| {
                    if let qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid_str) =
                        id.point_id_options?
                    {
                        Uuid::parse_str(&uuid_str).ok()
                    } else {
                        None
                    }
                })?;

                let payload = point.payload;
                let record = VectorRecord {
                    id,
                    text: payload.get("text")?.as_str()?.to_string(),
                    source: payload.get("source")?.as_str()?.to_string(),
                    user_id: payload
                        .get("user_id")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    created_at: payload
                        .get("created_at")
                        .and_then(|v| v.as_str())
                        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(Utc::now),
                };

                Some(ScoredRecord {
                    record,
                    score: point.score,
                })
            })
            .collect();

        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        let info = self.client.collection_info(&self.collection).await?;
        Ok(info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0))
    }
}

/// Process-local index used in tests and when Qdrant is not configured.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: RwLock<Vec<(VectorRecord, Vec<f32>)>>,
}

impl MemoryIndex {
    async fn upsert(&self, records: &[(VectorRecord, Vec<f32>)]) -> Result<usize> {
        let mut stored = self.records.write().await;
        let mut count = 0;
        for (record, embedding) in records {
            if embedding.is_empty() {
                continue;
            }
            stored.retain(|(existing, _)| existing.id != record.id);
            stored.push((record.clone(), embedding.clone()));
            count += 1;
        }
        Ok(count)
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredRecord>> {
        let stored = self.records.read().await;
        let mut hits: Vec<ScoredRecord> = stored
            .iter()
            .filter(|(record, _)| filter.matches(record))
            .map(|(record, stored_embedding)| ScoredRecord {
                record: record.clone(),
                score: cosine_similarity(embedding, stored_embedding),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }
}

trait QdrantValueExt {
    fn as_str(&self) -> Option<&str>;
}

impl QdrantValueExt for QdrantValue {
    fn as_str(&self) -> Option<&str> {
        match &self.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(v)) => Some(v),
            _ => None,
        }
    }
}
