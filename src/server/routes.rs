//! REST handlers for querying and reading session history.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::llm::ChatTurn;
use crate::metrics::record_query;

use super::AppState;

/// Session used when the caller does not pass `?session_id=`.
pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Seeds the session history when the session has no stored turns yet.
    #[serde(default)]
    pub message_history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
    pub new_messages: Vec<ChatTurn>,
}

/// POST /query: classify the question, gather context, answer.
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Json(request): Json<QueryRequest>,
) -> Response {
    let session_id = params
        .get("session_id")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());

    if request.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "No question provided"})),
        )
            .into_response();
    }

    // A caller-supplied history seeds the session when it has no turns yet;
    // otherwise the stored history wins.
    let history = match request.message_history {
        Some(seed) => {
            let stored = state.sessions.history(&session_id);
            if stored.is_empty() {
                state.sessions.append(&session_id, seed.clone());
                seed
            } else {
                stored
            }
        }
        None => state.sessions.history(&session_id),
    };

    let started = Instant::now();
    let user_id = state.agent.default_user().to_string();
    match state
        .agent
        .answer(&user_id, &request.question, &history)
        .await
    {
        Ok(reply) => {
            record_query(reply.route.as_str(), started.elapsed(), true);
            state.sessions.append(&session_id, reply.new_turns.clone());
            Json(QueryResponse {
                response: reply.response,
                new_messages: reply.new_turns,
            })
            .into_response()
        }
        Err(e) => {
            record_query("unknown", started.elapsed(), false);
            error!("Query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// GET /message-history/:session_id
pub async fn message_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<Vec<ChatTurn>> {
    Json(state.sessions.history(&session_id))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": state.sessions.session_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Router as QueryRouter};
    use crate::llm::ChatClient;
    use crate::memory::MemoryStore;
    use crate::rag::{HybridRetriever, RetrieverConfig};
    use crate::server::build_router;
    use crate::session::SessionStore;
    use crate::Config;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })
    }

    fn test_state(server: &MockServer) -> AppState {
        let chat = Arc::new(ChatClient::with_base_url(
            "test-key",
            &server.base_url(),
            "gpt-4o-mini",
        ));
        let retriever = Arc::new(HybridRetriever::local(RetrieverConfig::default(), 64));
        let memory = Arc::new(MemoryStore::local(64));
        let config = Config::defaults();
        let agent = Agent::new(chat, QueryRouter::heuristic(), retriever, memory, &config);

        AppState::new(Arc::new(agent), Arc::new(SessionStore::new()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn query_answers_and_records_session() {
        let llm = MockServer::start();
        llm.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .json_body(completion_body("Twenty days per year."));
        });

        let state = test_state(&llm);
        let app = build_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query?session_id=s1")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"question": "How many vacation days?"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"], "Twenty days per year.");
        assert_eq!(body["new_messages"][0]["role"], "user");
        assert_eq!(body["new_messages"][0]["content"], "How many vacation days?");
        assert_eq!(body["new_messages"][1]["role"], "assistant");

        // Turns were appended to the session store.
        assert_eq!(state.sessions.history("s1").len(), 2);
    }

    #[tokio::test]
    async fn query_without_session_id_uses_default() {
        let llm = MockServer::start();
        llm.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(completion_body("Answer."));
        });

        let state = test_state(&llm);
        let app = build_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"question": "Anything?"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.sessions.history(DEFAULT_SESSION).len(), 2);
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let llm = MockServer::start();
        let state = test_state(&llm);
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"question": "  "}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["detail"], "No question provided");
    }

    #[tokio::test]
    async fn supplied_history_seeds_a_fresh_session() {
        let llm = MockServer::start();
        let mock = llm.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("caller supplied context");
            then.status(200).json_body(completion_body("Used override."));
        });

        let state = test_state(&llm);
        let app = build_router(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query?session_id=s2")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "question": "Follow up?",
                            "message_history": [
                                {"role": "user", "content": "earlier question"},
                                {"role": "assistant", "content": "caller supplied context"}
                            ]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert();
        // Seed turns plus the new exchange.
        assert_eq!(state.sessions.history("s2").len(), 4);
    }

    #[tokio::test]
    async fn stored_history_wins_over_supplied_history() {
        let llm = MockServer::start();
        let mock = llm.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("stored answer");
            then.status(200).json_body(completion_body("Kept stored."));
        });

        let state = test_state(&llm);
        state.sessions.append(
            "s2b",
            vec![ChatTurn::user("old question"), ChatTurn::assistant("stored answer")],
        );
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query?session_id=s2b")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({
                            "question": "Follow up?",
                            "message_history": [
                                {"role": "assistant", "content": "should be ignored"}
                            ]
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        mock.assert();
    }

    #[tokio::test]
    async fn message_history_returns_stored_turns() {
        let llm = MockServer::start();
        let state = test_state(&llm);
        state.sessions.append(
            "s3",
            vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
        );

        let app = build_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/message-history/s3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["content"], "hi");
    }

    #[tokio::test]
    async fn message_history_for_unknown_session_is_empty() {
        let llm = MockServer::start();
        let app = build_router(test_state(&llm));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/message-history/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn llm_failure_maps_to_internal_error() {
        let llm = MockServer::start();
        llm.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("upstream broken");
        });

        let app = build_router(test_state(&llm));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"question": "Anything?"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().len() > 0);
    }

    #[tokio::test]
    async fn health_reports_status_uptime_and_sessions() {
        let llm = MockServer::start();
        let state = test_state(&llm);
        state.sessions.append("s", vec![ChatTurn::user("hi")]);
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_seconds"].is_u64());
        assert_eq!(body["sessions"], 1);
    }
}
