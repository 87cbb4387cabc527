//! LLM integration: chat completions and embeddings.

pub mod chat;
pub mod embeddings;

pub use chat::{ChatClient, ChatTurn};
pub use embeddings::{cosine_similarity, EmbeddingClient, LocalEmbedder, OpenAIEmbedder};
