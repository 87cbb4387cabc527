//! Chat completion client over the OpenAI API.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::{Error, Result};

/// Capacity of the delta channel returned by [`ChatClient::complete_stream`].
const STREAM_CHANNEL_CAPACITY: usize = 100;

/// One message in a conversation.
///
/// Serializes to the wire shape `{"role": "...", "content": "..."}` used by
/// the HTTP and websocket endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Client for chat completions (blocking and streamed).
pub struct ChatClient {
    client: OpenAIClient<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self::build(config, model.into())
    }

    /// Create a client against a custom API base (tests, local gateways).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self::build(config, model.into())
    }

    /// Create a client from application configuration.
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        if !config.has_openai_key() {
            return Err(Error::ConfigError(
                "OPENAI_API_KEY is not set; chat completions require an API key".to_string(),
            ));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());
        if let Some(base_url) = &config.openai_base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        let mut client = Self::build(openai_config, config.chat_model.clone());
        client.max_tokens = config.max_tokens;
        client.temperature = config.temperature;
        Ok(client)
    }

    fn build(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: OpenAIClient::with_config(config),
            model,
            max_tokens: 512,
            temperature: 0.7,
        }
    }

    /// Run a chat completion and return the full response text.
    pub async fn complete(&self, turns: &[ChatTurn]) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(turns)?)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::LlmError("no choices in response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    /// Run a streamed chat completion.
    ///
    /// Delta chunks arrive on the returned receiver; the channel closes when
    /// the stream finishes or errors. Dropping the receiver cancels the
    /// forwarding task on its next send.
    pub async fn complete_stream(&self, turns: &[ChatTurn]) -> Result<mpsc::Receiver<String>> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(turns)?)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .stream(true)
            .build()?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let mut stream = self.client.chat().create_stream(request).await?;

        tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(response) => {
                        for choice in response.choices {
                            if let Some(content) = &choice.delta.content {
                                if tx.send(content.clone()).await.is_err() {
                                    // Receiver dropped, stop streaming
                                    return;
                                }
                            }
                        }
                    }
                    Err(err) => {
                        warn!("Chat stream error: {}", err);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

fn build_messages(turns: &[ChatTurn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(turns.len());

    for turn in turns {
        let message: ChatCompletionRequestMessage = match turn.role.as_str() {
            "system" => ChatCompletionRequestSystemMessageArgs::default()
                .content(turn.content.as_str())
                .build()?
                .into(),
            "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.content.as_str())
                .build()?
                .into(),
            // Unknown roles are treated as user input
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.content.as_str())
                .build()?
                .into(),
        };
        messages.push(message);
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> ChatClient {
        ChatClient::with_base_url("test-key", &server.base_url(), "gpt-4o-mini")
    }

    #[test]
    fn chat_turn_constructors_set_roles() {
        assert_eq!(ChatTurn::system("s").role, "system");
        assert_eq!(ChatTurn::user("u").role, "user");
        assert_eq!(ChatTurn::assistant("a").role, "assistant");
        assert_eq!(ChatTurn::user("hello").content, "hello");
    }

    #[test]
    fn chat_turn_serializes_to_wire_shape() {
        let turn = ChatTurn::user("hi there");
        let value = serde_json::to_value(&turn).unwrap();

        assert_eq!(value, json!({"role": "user", "content": "hi there"}));
    }

    #[test]
    fn chat_turn_deserializes_from_wire_shape() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role": "assistant", "content": "done"}"#).unwrap();

        assert_eq!(turn, ChatTurn::assistant("done"));
    }

    #[test]
    fn build_messages_maps_roles() {
        let turns = vec![
            ChatTurn::system("sys"),
            ChatTurn::user("usr"),
            ChatTurn::assistant("asst"),
            ChatTurn {
                role: "tool".to_string(),
                content: "fallback".to_string(),
            },
        ];

        let messages = build_messages(&turns).unwrap();

        assert_eq!(messages.len(), 4);
        assert!(matches!(
            messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(
            messages[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
        assert!(matches!(messages[3], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn from_config_requires_api_key() {
        let mut config = crate::Config::defaults();
        config.openai_api_key = String::new();

        let result = ChatClient::from_config(&config);

        assert!(result.is_err());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn complete_returns_response_content() {
        let server = MockServer::start();
        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Hello there"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}
            }));
        });

        let response = client(&server)
            .complete(&[ChatTurn::user("hi")])
            .await
            .unwrap();

        assert_eq!(response, "Hello there");
        completion_mock.assert();
    }

    #[tokio::test]
    async fn complete_fails_on_empty_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-4o-mini",
                "choices": [],
                "usage": {"prompt_tokens": 9, "completion_tokens": 0, "total_tokens": 9}
            }));
        });

        let result = client(&server).complete(&[ChatTurn::user("hi")]).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn complete_fails_on_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("internal error");
        });

        let result = client(&server).complete(&[ChatTurn::user("hi")]).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn complete_stream_forwards_delta_chunks() {
        let server = MockServer::start();
        let body = concat!(
            "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"chatcmpl-1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"gpt-4o-mini\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let stream_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let mut rx = client(&server)
            .complete_stream(&[ChatTurn::user("hi")])
            .await
            .unwrap();

        let mut collected = String::new();
        while let Some(chunk) = rx.recv().await {
            collected.push_str(&chunk);
        }

        assert_eq!(collected, "Hello");
        stream_mock.assert();
    }
}
