//! Embedding generation for chunks, memories and entity curation.

use async_openai::{
    config::OpenAIConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client as OpenAIClient,
};
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Inputs longer than this are truncated before the embeddings call.
const MAX_EMBED_CHARS: usize = 8000;

/// OpenAI-backed embedder.
pub struct OpenAIEmbedder {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
}

impl OpenAIEmbedder {
    /// Create an embedder with an explicit API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        }
    }

    /// Create an embedder against a custom API base (tests, local gateways).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: OpenAIClient::with_config(config),
            model: model.into(),
        }
    }

    /// Generate embeddings for multiple texts in batch.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // Filter out empty texts and truncate long ones on a char boundary
        let processed: Vec<String> = texts
            .iter()
            .map(|t| {
                let trimmed = t.trim();
                if trimmed.len() > MAX_EMBED_CHARS {
                    let mut end = MAX_EMBED_CHARS;
                    while !trimmed.is_char_boundary(end) {
                        end -= 1;
                    }
                    trimmed[..end].to_string()
                } else {
                    trimmed.to_string()
                }
            })
            .filter(|t| !t.is_empty())
            .collect();

        if processed.is_empty() {
            return Ok(vec![Vec::new(); texts.len()]);
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::StringArray(processed))
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        info!(
            "Generated {} embeddings, tokens used: {}",
            response.data.len(),
            response.usage.total_tokens
        );

        // Map back to original indices (empty texts get empty vectors)
        let mut result = Vec::with_capacity(texts.len());
        let mut embed_iter = response.data.into_iter();

        for text in texts {
            if text.trim().is_empty() {
                result.push(Vec::new());
            } else if let Some(embed) = embed_iter.next() {
                result.push(embed.embedding);
            }
        }

        Ok(result)
    }

    /// Get the embedding dimension for the current model.
    pub fn dimension(&self) -> usize {
        match self.model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // default
        }
    }
}

/// Deterministic, fast embedding for offline/local use.
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dim: usize,
}

impl LocalEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut vec = vec![0.0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            vec[idx] += 1.0;
        }

        normalize(&mut vec);
        vec
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }
}

/// Embedding backend: OpenAI when a key is configured, local otherwise.
#[allow(clippy::large_enum_variant)]
pub enum EmbeddingClient {
    OpenAI(OpenAIEmbedder),
    Local(LocalEmbedder),
}

impl EmbeddingClient {
    /// Pick the backend from application configuration.
    pub fn from_config(config: &crate::Config) -> Self {
        if config.has_openai_key() {
            info!("Embeddings: using OpenAI model {}", config.embedding_model);
            let embedder = match &config.openai_base_url {
                Some(base_url) => OpenAIEmbedder::with_base_url(
                    config.openai_api_key.clone(),
                    base_url,
                    config.embedding_model.clone(),
                ),
                None => OpenAIEmbedder::new(
                    config.openai_api_key.clone(),
                    config.embedding_model.clone(),
                ),
            };
            EmbeddingClient::OpenAI(embedder)
        } else {
            warn!("Embeddings: OPENAI_API_KEY not set, falling back to local hash embeddings");
            EmbeddingClient::Local(LocalEmbedder::new(config.embedding_dim))
        }
    }

    /// Force local embeddings (tests, offline ingestion).
    pub fn local(dim: usize) -> Self {
        EmbeddingClient::Local(LocalEmbedder::new(dim))
    }

    /// Generate an embedding for a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingError("no embedding returned".to_string()))
    }

    /// Generate embeddings for multiple texts in batch.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            EmbeddingClient::OpenAI(service) => service.embed_batch(texts).await,
            EmbeddingClient::Local(local) => Ok(texts.iter().map(|t| local.embed(t)).collect()),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingClient::OpenAI(service) => service.dimension(),
            EmbeddingClient::Local(local) => local.dimension(),
        }
    }
}

/// Cosine similarity; mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vec.iter_mut() {
            *v /= norm;
        }
    }
}
