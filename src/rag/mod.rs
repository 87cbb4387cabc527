//! Hybrid knowledge retrieval: chunking, entity graph, vector index, KV store.

pub mod chunker;
pub mod dedup;
pub mod extractor;
pub mod graph;
pub mod ingest;
pub mod kv;
pub mod retriever;
pub mod vector;

pub use chunker::{Chunk, Chunker};
pub use dedup::{CurationReport, EntityEmbedding, MergePlan, SimilarCandidate, SimilarityMetric};
pub use extractor::{Entity, EntityExtractor, EntityKind, Relation};
pub use graph::{EntityRecord, GraphStats, GraphStore};
pub use ingest::{ingest_directory, ingest_file};
pub use kv::{KvStore, StoredChunk};
pub use retriever::{HybridRetriever, RetrievalHit, RetrievalMode, RetrieverConfig};
pub use vector::{ScoredRecord, SearchFilter, VectorIndex, VectorRecord};
