//! Websocket endpoint streaming answer chunks as they are generated.
//!
//! The client sends `{"question": "..."}` frames. For each question the
//! server replies with zero or more `{"type": "chunk", "content": ...}`
//! frames followed by `{"type": "complete", "new_messages": [...]}`.
//! Malformed or empty questions produce a `{"type": "error", ...}` frame
//! without closing the connection.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::llm::ChatTurn;
use crate::metrics::{record_query, ws_connection_closed, ws_connection_opened};

use super::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(90);
const CHUNK_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Chunk { content: String },
    Complete { new_messages: Vec<ChatTurn> },
    Error { content: String },
}

/// GET /ws/:session_id
pub async fn websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!(session_id = %session_id, "Websocket upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    ws_connection_opened();
    let (mut sender, mut receiver) = socket.split();

    let mut ping_interval = interval(PING_INTERVAL);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    warn!(session_id = %session_id, "Websocket client unresponsive, closing");
                    break;
                }
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }

            next = receiver.next() => {
                match next {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session_id, "Websocket closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sender.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Text(text))) => {
                        let question = parse_question(&text);
                        let outcome = match question {
                            Some(question) => {
                                stream_answer(&mut sender, &state, &session_id, &question).await
                            }
                            None => {
                                send_frame(&mut sender, &ServerMessage::Error {
                                    content: "No question provided".to_string(),
                                })
                                .await
                            }
                        };
                        if outcome.is_err() {
                            break;
                        }
                        // Streaming counts as liveness.
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(session_id = %session_id, "Ignoring binary frame");
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "Websocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    ws_connection_closed();
}

/// Extract a non-empty question from a client text frame.
fn parse_question(text: &str) -> Option<String> {
    let message: ClientMessage = serde_json::from_str(text).ok()?;
    let question = message.question.trim();
    if question.is_empty() {
        None
    } else {
        Some(question.to_string())
    }
}

/// Answer one question, forwarding chunks to the socket as they arrive.
/// Returns `Err` only when the socket itself is gone; agent failures are
/// reported to the client as error frames.
async fn stream_answer(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
    session_id: &str,
    question: &str,
) -> std::result::Result<(), axum::Error> {
    let (tx, mut rx) = mpsc::channel::<String>(CHUNK_CHANNEL_CAPACITY);
    let agent = state.agent.clone();
    let history = state.sessions.history(session_id);
    let user_id = agent.default_user().to_string();
    let question = question.to_string();

    let started = Instant::now();
    let task = tokio::spawn(async move {
        agent.answer_stream(&user_id, &question, &history, tx).await
    });

    while let Some(chunk) = rx.recv().await {
        send_frame(sender, &ServerMessage::Chunk { content: chunk }).await?;
    }

    match task.await {
        Ok(Ok(reply)) => {
            record_query(reply.route.as_str(), started.elapsed(), true);
            state.sessions.append(session_id, reply.new_turns.clone());
            send_frame(
                sender,
                &ServerMessage::Complete {
                    new_messages: reply.new_turns,
                },
            )
            .await?;
        }
        Ok(Err(e)) => {
            record_query("unknown", started.elapsed(), false);
            warn!(session_id = %session_id, "Websocket query failed: {}", e);
            send_frame(
                sender,
                &ServerMessage::Error {
                    content: e.to_string(),
                },
            )
            .await?;
        }
        Err(e) => {
            record_query("unknown", started.elapsed(), false);
            warn!(session_id = %session_id, "Answer task failed: {}", e);
            send_frame(
                sender,
                &ServerMessage::Error {
                    content: "internal error".to_string(),
                },
            )
            .await?;
        }
    }

    Ok(())
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &ServerMessage,
) -> std::result::Result<(), axum::Error> {
    let payload = serde_json::to_string(frame)
        .unwrap_or_else(|_| r#"{"type":"error","content":"serialization failed"}"#.to_string());
    sender.send(Message::Text(payload)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_frame_shape() {
        let frame = ServerMessage::Chunk {
            content: "partial ".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "chunk");
        assert_eq!(json["content"], "partial ");
    }

    #[test]
    fn complete_frame_carries_new_messages() {
        let frame = ServerMessage::Complete {
            new_messages: vec![ChatTurn::user("q"), ChatTurn::assistant("a")],
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "complete");
        assert_eq!(json["new_messages"][0]["role"], "user");
        assert_eq!(json["new_messages"][1]["content"], "a");
    }

    #[test]
    fn error_frame_shape() {
        let frame = ServerMessage::Error {
            content: "No question provided".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["content"], "No question provided");
    }

    #[test]
    fn parse_question_accepts_well_formed_frames() {
        assert_eq!(
            parse_question(r#"{"question": "How many vacation days?"}"#),
            Some("How many vacation days?".to_string())
        );
    }

    #[test]
    fn parse_question_trims_whitespace() {
        assert_eq!(
            parse_question(r#"{"question": "  padded  "}"#),
            Some("padded".to_string())
        );
    }

    #[test]
    fn parse_question_rejects_empty_and_missing() {
        assert_eq!(parse_question(r#"{"question": ""}"#), None);
        assert_eq!(parse_question(r#"{"question": "   "}"#), None);
        assert_eq!(parse_question(r#"{}"#), None);
        assert_eq!(parse_question("not json"), None);
    }

    #[test]
    fn extra_fields_are_ignored() {
        assert_eq!(
            parse_question(r#"{"question": "hi", "mode": "mix"}"#),
            Some("hi".to_string())
        );
    }
}
