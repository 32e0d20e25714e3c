//! # Mock Streaming Model for Testing
//!
//! Provides a `MockStreamingModel` that implements `StreamingModel` without
//! calling a provider. It replays scripted chunks (or errors) and records
//! every conversation it was asked to continue.

use std::sync::Arc;

use async_stream::stream;
use tokio::sync::Mutex;

use super::{ChatMessage, ModelError, StreamingModel, TextStream};

/// A scripted streaming model.
#[derive(Debug, Clone, Default)]
pub struct MockStreamingModel {
    chunks: Arc<Mutex<Vec<Result<String, ModelError>>>>,
    open_error: Arc<Mutex<Option<ModelError>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockStreamingModel {
    /// Creates a model that streams nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model that streams `text` split into chunks of `chunk_size` characters.
    pub async fn with_text(text: &str, chunk_size: usize) -> Self {
        let model = Self::new();
        model.set_text_response(text, chunk_size).await;
        model
    }

    /// Sets the exact sequence of chunk results to stream.
    pub async fn set_chunks(&self, chunks: Vec<Result<String, ModelError>>) {
        *self.chunks.lock().await = chunks;
    }

    /// Helper to stream a text response in fixed-size pieces.
    pub async fn set_text_response(&self, text: &str, chunk_size: usize) {
        let chars: Vec<char> = text.chars().collect();
        let chunks = chars
            .chunks(chunk_size.max(1))
            .map(|piece| Ok(piece.iter().collect::<String>()))
            .collect();
        self.set_chunks(chunks).await;
    }

    /// Makes the next calls fail before any stream is returned.
    pub async fn set_open_error(&self, error: ModelError) {
        *self.open_error.lock().await = Some(error);
    }

    /// Conversations received so far.
    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().await.clone()
    }
}

impl StreamingModel for MockStreamingModel {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, ModelError> {
        self.requests.lock().await.push(messages);

        if let Some(error) = self.open_error.lock().await.clone() {
            return Err(error);
        }

        let chunks = self.chunks.lock().await.clone();
        Ok(Box::pin(stream! {
            for chunk in chunks {
                yield chunk;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_text_is_replayed_in_chunks() {
        let model = MockStreamingModel::with_text("abcdefg", 3).await;
        let stream = model.stream(vec![ChatMessage::user("hi")]).await.unwrap();
        let chunks: Vec<String> = stream.map(|c| c.unwrap()).collect().await;

        assert_eq!(chunks, vec!["abc", "def", "g"]);
        assert_eq!(model.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_open_error() {
        let model = MockStreamingModel::new();
        model
            .set_open_error(ModelError::Completion("quota".to_string()))
            .await;

        assert!(model.stream(vec![ChatMessage::user("hi")]).await.is_err());
    }
}
