//! # LLM Streaming Module
//!
//! The model-streaming capability the evaluator talks to, and a client that
//! provides it on top of a `rig` provider with client-side rate limiting.
//!
//! ## Key Components
//!
//! - `StreamingModel`: Accepts role-tagged messages and returns a lazy text stream
//! - `Client`: Rate-limited wrapper over a rig completion model; `GeminiClient` streams
//! - `MockStreamingModel`: Scripted model for tests
//!
//! The system message becomes the agent preamble, the final user message the
//! prompt, and everything in between the chat history.

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rig::agent::AgentBuilder;
use rig::completion::CompletionModel;
use rig::message::Message;
use rig::providers::gemini;
use rig::streaming::{StreamingChat, StreamingChoice};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, debug_span, info_span, Instrument};

use crate::error::Error as CrateError;

pub mod mock_model;

pub use mock_model::MockStreamingModel;

/// Default Gemini model used for evaluation
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Lazy sequence of text chunks produced by a model
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// Error type for model calls
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The request was malformed before it reached the provider
    #[error("Invalid model request: {0}")]
    InvalidRequest(String),

    /// The provider refused or failed the call
    #[error("Completion error: {0}")]
    Completion(String),

    /// A chunk failed after the stream started
    #[error("Stream error: {0}")]
    Stream(String),

    /// Missing configuration such as an API key
    #[error("Model configuration error: {0}")]
    Config(String),
}

impl From<ModelError> for CrateError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Config(msg) => CrateError::Config(msg),
            _ => CrateError::Model(err.to_string()),
        }
    }
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Something that turns a conversation into a stream of text
pub trait StreamingModel: Send + Sync {
    fn stream(
        &self,
        messages: Vec<ChatMessage>,
    ) -> impl Future<Output = Result<TextStream, ModelError>> + Send;
}

/// Configuration for the model client
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Provider model name
    pub model_name: String,

    /// Client-side request quota
    pub requests_per_minute: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            requests_per_minute: 30,
        }
    }
}

/// Rate-limited streaming client over a rig completion model
#[derive(Clone)]
pub struct Client<M>
where
    M: CompletionModel,
{
    model: M,
    limiter: Arc<DefaultDirectRateLimiter>,
}

/// Client over the Gemini provider
pub type GeminiClient = Client<gemini::completion::CompletionModel>;

impl GeminiClient {
    /// Build a Gemini client from `GEMINI_API_KEY`
    pub fn new_gemini_from_env(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ModelError::Config("GEMINI_API_KEY environment variable must be set".to_string())
        })?;
        Self::new_gemini(&gemini::Client::new(&api_key), config)
    }

    pub fn new_gemini(
        gemini_client: &gemini::Client,
        config: &ModelConfig,
    ) -> Result<Self, ModelError> {
        Self::new(gemini_client.completion_model(&config.model_name), config)
    }
}

impl<M> Client<M>
where
    M: CompletionModel,
{
    pub fn new(model: M, config: &ModelConfig) -> Result<Self, ModelError> {
        let quota = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            ModelError::Config("requests_per_minute must be greater than zero".to_string())
        })?;
        Ok(Self {
            model,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(quota))),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl StreamingModel for GeminiClient {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, ModelError> {
        let (preamble, history, prompt) = split_conversation(messages)?;

        self.limiter.until_ready().instrument(debug_span!("limiter")).await;

        let agent = AgentBuilder::new(self.model.clone())
            .preamble(&preamble)
            .build();
        debug!(history_len = history.len(), "Opening model stream");
        let stream = agent
            .stream_chat(&prompt, history)
            .instrument(info_span!("stream_chat"))
            .await
            .map_err(|e| ModelError::Completion(e.to_string()))?;

        let text = stream.filter_map(|choice| async move {
            match choice {
                Ok(StreamingChoice::Message(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(ModelError::Stream(e.to_string()))),
            }
        });
        Ok(Box::pin(text))
    }
}

/// Split messages into preamble, prior history and the final user prompt
fn split_conversation(
    messages: Vec<ChatMessage>,
) -> Result<(String, Vec<Message>, String), ModelError> {
    let mut preamble = Vec::new();
    let mut turns = Vec::new();
    for message in messages {
        match message.role {
            Role::System => preamble.push(message.content),
            Role::User | Role::Assistant => turns.push(message),
        }
    }

    let prompt = match turns.pop() {
        Some(ChatMessage {
            role: Role::User,
            content,
        }) => content,
        _ => {
            return Err(ModelError::InvalidRequest(
                "conversation must end with a user message".to_string(),
            ));
        }
    };

    let history = turns
        .into_iter()
        .map(|turn| match turn.role {
            Role::Assistant => Message::assistant(&turn.content),
            _ => Message::user(&turn.content),
        })
        .collect();

    Ok((preamble.join("\n\n"), history, prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_conversation() {
        let (preamble, history, prompt) = split_conversation(vec![
            ChatMessage::system("be strict"),
            ChatMessage::user("first"),
            ChatMessage::assistant("ok"),
            ChatMessage::user("evaluate this"),
        ])
        .unwrap();

        assert_eq!(preamble, "be strict");
        assert_eq!(history.len(), 2);
        assert_eq!(prompt, "evaluate this");
    }

    #[test]
    fn test_split_conversation_requires_user_prompt() {
        let result = split_conversation(vec![ChatMessage::system("only a preamble")]);

        assert!(matches!(result, Err(ModelError::InvalidRequest(_))));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();

        assert_eq!(json, serde_json::json!({"role": "system", "content": "x"}));
    }

    fn assert_streaming_model<T: StreamingModel + 'static>(_: &T) {}

    #[test]
    fn test_gemini_client_is_a_streaming_model() {
        let gemini_client = gemini::Client::new("test-key");
        let client = Client::new_gemini(&gemini_client, &ModelConfig::default()).unwrap();

        assert_streaming_model(&client);
        assert!(client.limiter.check().is_ok());
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let config = ModelConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        let gemini_client = gemini::Client::new("test-key");

        assert!(matches!(
            Client::new_gemini(&gemini_client, &config),
            Err(ModelError::Config(_))
        ));
    }
}
