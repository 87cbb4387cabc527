//! HR assistant library
//!
//! This library provides tools to:
//! - Answer HR questions over a hybrid graph/vector/key-value knowledge base
//! - Route each query to knowledge retrieval, memory recall, or memory storage
//! - Remember per-user facts and retrieve them by semantic similarity
//! - Ingest plain-text documents into chunks, embeddings, and an entity graph
//! - Curate the entity graph by merging near-duplicate entities
//! - Serve the agent over HTTP and websocket with per-session history

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod prompts;
pub mod rag;
pub mod server;
pub mod session;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
