//! Query routing: one-word LLM classification with keyword fallback

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::llm::{ChatClient, ChatTurn};
use crate::prompts::{build_router_message, ROUTER_PROMPT};

/// Timeout for the classification call; the keyword fallback takes over
/// after it expires.
const ROUTE_TIMEOUT: Duration = Duration::from_secs(5);

/// The three things the assistant can do with a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRoute {
    /// Save a personal fact for the user
    StoreMemory,
    /// Answer from the user's stored facts
    RetrieveMemory,
    /// Answer from the shared knowledge base
    RetrieveKnowledge,
}

impl QueryRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryRoute::StoreMemory => "store_memory",
            QueryRoute::RetrieveMemory => "retrieve_memory",
            QueryRoute::RetrieveKnowledge => "retrieve_knowledge",
        }
    }
}

/// Classifies questions into a [`QueryRoute`] via a cheap LLM call.
/// When the call fails or times out, keyword heuristics decide instead.
pub struct Router {
    chat: Option<Arc<ChatClient>>,
}

impl Router {
    pub fn new(chat: Arc<ChatClient>) -> Self {
        Self { chat: Some(chat) }
    }

    /// Router without an LLM; classification uses only keyword heuristics
    /// (offline runs and tests).
    pub fn heuristic() -> Self {
        Self { chat: None }
    }

    pub async fn route(&self, question: &str) -> QueryRoute {
        let Some(chat) = &self.chat else {
            return fallback_route(question);
        };

        let turns = vec![
            ChatTurn::system(ROUTER_PROMPT),
            ChatTurn::user(build_router_message(question)),
        ];

        match tokio::time::timeout(ROUTE_TIMEOUT, chat.complete(&turns)).await {
            Ok(Ok(response)) => {
                let route = parse_route(&response);
                debug!(
                    response = response.trim(),
                    route = route.as_str(),
                    "Routed query"
                );
                route
            }
            Ok(Err(err)) => {
                warn!("Routing call failed, using keyword fallback: {err}");
                fallback_route(question)
            }
            Err(_) => {
                warn!("Routing call timed out, using keyword fallback");
                fallback_route(question)
            }
        }
    }
}

/// Parse the classification response. Tries an exact match first, then a
/// contains-based fallback. Unrecognized responses default to knowledge
/// retrieval.
pub fn parse_route(response: &str) -> QueryRoute {
    let trimmed = response.trim().to_lowercase();

    match trimmed.as_str() {
        "store_memory" => return QueryRoute::StoreMemory,
        "retrieve_memory" => return QueryRoute::RetrieveMemory,
        "retrieve_knowledge" => return QueryRoute::RetrieveKnowledge,
        _ => {}
    }

    // "store" before "memory" since store_memory contains both words
    if trimmed.contains("store") {
        return QueryRoute::StoreMemory;
    }
    if trimmed.contains("knowledge") {
        return QueryRoute::RetrieveKnowledge;
    }
    if trimmed.contains("memory") {
        return QueryRoute::RetrieveMemory;
    }

    QueryRoute::RetrieveKnowledge
}

/// Keyword heuristic for when no LLM is reachable. Recall questions are
/// checked before store statements: "do you remember what I like" must not
/// match the "i like" store marker.
pub fn fallback_route(question: &str) -> QueryRoute {
    let lower = question.to_lowercase();

    let recall_markers = [
        "do you remember",
        "what do i",
        "what are my",
        "my interests",
        "about me",
        "did i tell",
        "was mag ich",
        "woran arbeite ich",
    ];
    if recall_markers.iter().any(|m| lower.contains(m)) {
        return QueryRoute::RetrieveMemory;
    }

    let store_markers = [
        "remember that",
        "remember:",
        "note that",
        "i like",
        "i prefer",
        "i want to learn",
        "my favorite",
        "my favourite",
        "ich mag",
        "merk dir",
    ];
    if store_markers.iter().any(|m| lower.contains(m)) {
        return QueryRoute::StoreMemory;
    }

    QueryRoute::RetrieveKnowledge
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn parse_exact_routes() {
        assert_eq!(parse_route("store_memory"), QueryRoute::StoreMemory);
        assert_eq!(parse_route("retrieve_memory"), QueryRoute::RetrieveMemory);
        assert_eq!(
            parse_route("retrieve_knowledge"),
            QueryRoute::RetrieveKnowledge
        );
    }

    #[test]
    fn parse_tolerates_whitespace_and_casing() {
        assert_eq!(parse_route("  Store_Memory \n"), QueryRoute::StoreMemory);
        assert_eq!(parse_route("RETRIEVE_MEMORY"), QueryRoute::RetrieveMemory);
    }

    #[test]
    fn parse_fuzzy_contains() {
        assert_eq!(
            parse_route("I would store_memory this one"),
            QueryRoute::StoreMemory
        );
        assert_eq!(
            parse_route("this is about the user's memory"),
            QueryRoute::RetrieveMemory
        );
        assert_eq!(
            parse_route("category: knowledge"),
            QueryRoute::RetrieveKnowledge
        );
    }

    #[test]
    fn parse_unknown_defaults_to_knowledge() {
        assert_eq!(parse_route("banana"), QueryRoute::RetrieveKnowledge);
        assert_eq!(parse_route(""), QueryRoute::RetrieveKnowledge);
    }

    #[test]
    fn fallback_detects_store_statements() {
        assert_eq!(
            fallback_route("Remember that I want to learn Rust"),
            QueryRoute::StoreMemory
        );
        assert_eq!(
            fallback_route("I like hiking in the Alps"),
            QueryRoute::StoreMemory
        );
        assert_eq!(fallback_route("Ich mag Bergwandern"), QueryRoute::StoreMemory);
    }

    #[test]
    fn fallback_detects_recall_questions() {
        assert_eq!(
            fallback_route("What do I like to do on weekends?"),
            QueryRoute::RetrieveMemory
        );
        assert_eq!(
            fallback_route("Do you remember what I like?"),
            QueryRoute::RetrieveMemory
        );
        assert_eq!(
            fallback_route("What are my interests?"),
            QueryRoute::RetrieveMemory
        );
    }

    #[test]
    fn fallback_defaults_to_knowledge() {
        assert_eq!(
            fallback_route("How many vacation days am I entitled to?"),
            QueryRoute::RetrieveKnowledge
        );
        assert_eq!(
            fallback_route("Wie lange ist die Kündigungsfrist?"),
            QueryRoute::RetrieveKnowledge
        );
    }

    #[test]
    fn route_names() {
        assert_eq!(QueryRoute::StoreMemory.as_str(), "store_memory");
        assert_eq!(QueryRoute::RetrieveMemory.as_str(), "retrieve_memory");
        assert_eq!(QueryRoute::RetrieveKnowledge.as_str(), "retrieve_knowledge");
    }

    #[tokio::test]
    async fn heuristic_router_never_calls_an_llm() {
        let router = Router::heuristic();
        assert_eq!(
            router.route("I prefer afternoon meetings").await,
            QueryRoute::StoreMemory
        );
        assert_eq!(
            router.route("How long is the Probezeit?").await,
            QueryRoute::RetrieveKnowledge
        );
    }

    #[tokio::test]
    async fn llm_router_uses_classification_response() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 0,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "store_memory"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            }));
        });

        let chat = ChatClient::with_base_url("test-key", &server.base_url(), "gpt-4o-mini");
        let router = Router::new(Arc::new(chat));

        let route = router.route("anything at all").await;
        assert_eq!(route, QueryRoute::StoreMemory);
        mock.assert();
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_keywords() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("boom");
        });

        let chat = ChatClient::with_base_url("test-key", &server.base_url(), "gpt-4o-mini");
        let router = Router::new(Arc::new(chat));

        let route = router.route("Remember that I like tea").await;
        assert_eq!(route, QueryRoute::StoreMemory);
    }
}
