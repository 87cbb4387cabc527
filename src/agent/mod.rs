//! Query agent: route the question, gather context, generate the answer

pub mod router;

pub use router::{QueryRoute, Router};

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::llm::{ChatClient, ChatTurn};
use crate::memory::{format_memories, MemoryStore};
use crate::prompts;
use crate::rag::retriever::build_context;
use crate::rag::{HybridRetriever, RetrievalMode};
use crate::{Config, Result};

/// Agent answer together with the turns to append to the session history.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub response: String,
    pub route: QueryRoute,
    /// Raw user question followed by the assistant response
    pub new_turns: Vec<ChatTurn>,
}

/// The assistant core. Every question is classified, enriched with either
/// retrieved knowledge or the user's memories, then answered by the chat
/// model with the session history in context.
pub struct Agent {
    chat: Arc<ChatClient>,
    router: Router,
    retriever: Arc<HybridRetriever>,
    memory: Arc<MemoryStore>,
    mode: RetrievalMode,
    top_k: usize,
    memory_top_k: usize,
    default_user: String,
}

impl Agent {
    pub fn new(
        chat: Arc<ChatClient>,
        router: Router,
        retriever: Arc<HybridRetriever>,
        memory: Arc<MemoryStore>,
        config: &Config,
    ) -> Self {
        Self {
            chat,
            router,
            retriever,
            memory,
            mode: RetrievalMode::parse(&config.retrieval_mode),
            top_k: config.top_k,
            memory_top_k: config.memory_top_k,
            default_user: config.default_user.clone(),
        }
    }

    /// User the memory routes act on when the caller does not specify one.
    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Answer a question in one shot.
    pub async fn answer(
        &self,
        user_id: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<AgentReply> {
        let (route, turns) = self.build_turns(user_id, question, history).await?;
        let response = self.chat.complete(&turns).await?;
        info!(route = route.as_str(), "Answered query");
        Ok(reply(route, question, response))
    }

    /// Answer a question while forwarding response chunks to `tx` as they
    /// arrive. The full response is still accumulated and returned so the
    /// session history stays complete even if the receiver goes away.
    pub async fn answer_stream(
        &self,
        user_id: &str,
        question: &str,
        history: &[ChatTurn],
        tx: mpsc::Sender<String>,
    ) -> Result<AgentReply> {
        let (route, turns) = self.build_turns(user_id, question, history).await?;
        let mut rx = self.chat.complete_stream(&turns).await?;

        let mut response = String::new();
        let mut forward = true;
        while let Some(chunk) = rx.recv().await {
            response.push_str(&chunk);
            if forward && tx.send(chunk).await.is_err() {
                forward = false;
            }
        }

        info!(route = route.as_str(), "Streamed query answer");
        Ok(reply(route, question, response))
    }

    /// Classify the question and assemble the chat turns for the answer
    /// call. Memory stores happen here so the confirmation prompt can
    /// reference the saved fact.
    async fn build_turns(
        &self,
        user_id: &str,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<(QueryRoute, Vec<ChatTurn>)> {
        let route = self.router.route(question).await;

        let user_message = match route {
            QueryRoute::StoreMemory => {
                let fact = self.memory.store(user_id, question).await?;
                prompts::build_store_confirmation_prompt(&fact.text)
            }
            QueryRoute::RetrieveMemory => {
                let memories = self
                    .memory
                    .search(user_id, question, self.memory_top_k)
                    .await?;
                prompts::build_memory_prompt(question, &format_memories(&memories))
            }
            QueryRoute::RetrieveKnowledge => {
                let hits = self.retriever.retrieve(question, self.top_k, self.mode).await?;
                prompts::build_knowledge_prompt(question, &build_context(&hits))
            }
        };

        let mut turns = Vec::with_capacity(history.len() + 2);
        turns.push(ChatTurn::system(prompts::SYSTEM_PROMPT));
        turns.extend(history.iter().cloned());
        turns.push(ChatTurn::user(user_message));
        Ok((route, turns))
    }
}

fn reply(route: QueryRoute, question: &str, response: String) -> AgentReply {
    AgentReply {
        new_turns: vec![ChatTurn::user(question), ChatTurn::assistant(&response)],
        response,
        route,
    }
}
