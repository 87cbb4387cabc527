//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. Commands assemble
//! the storage backends and agent from configuration, run one operation,
//! and print human-readable output.

pub mod ask;
pub mod curate;
pub mod ingest;
pub mod memory;
pub mod serve;

use std::sync::Arc;

use anyhow::Result;

use crate::agent::{Agent, Router};
use crate::llm::{ChatClient, EmbeddingClient};
use crate::memory::MemoryStore;
use crate::rag::{GraphStore, HybridRetriever, KvStore, RetrieverConfig, VectorIndex};
use crate::Config;

/// Storage and model backends shared by the commands.
pub struct AppComponents {
    pub embedder: Arc<EmbeddingClient>,
    pub retriever: Arc<HybridRetriever>,
    pub memory: Arc<MemoryStore>,
}

impl AppComponents {
    /// Build the backends from configuration and make sure the vector
    /// collections exist.
    pub async fn init(config: &Config) -> Result<Self> {
        let embedder = Arc::new(EmbeddingClient::from_config(config));
        let dimension = embedder.dimension();

        let knowledge = VectorIndex::from_config(config, &config.knowledge_collection, dimension)?;
        knowledge.init_collection().await?;
        let graph = GraphStore::from_config(config).await?;
        let retriever = Arc::new(HybridRetriever::new(
            RetrieverConfig::from_config(config),
            embedder.clone(),
            knowledge,
            graph,
            KvStore::new(),
        ));

        let memories = VectorIndex::from_config(config, &config.memory_collection, dimension)?;
        let memory = Arc::new(MemoryStore::new(embedder.clone(), memories));
        memory.init().await?;

        Ok(Self {
            embedder,
            retriever,
            memory,
        })
    }
}

/// Assemble the query agent on top of the shared components.
/// Fails when no OpenAI API key is configured.
pub fn build_agent(config: &Config, components: &AppComponents) -> Result<Agent> {
    let chat = Arc::new(ChatClient::from_config(config)?);
    let router = Router::new(chat.clone());
    Ok(Agent::new(
        chat,
        router,
        components.retriever.clone(),
        components.memory.clone(),
        config,
    ))
}
