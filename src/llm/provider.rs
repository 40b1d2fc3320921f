use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use super::types::ChatRequest;

/// Incremental text deltas of one streamed completion. The channel closes
/// when the hosted model signals completion.
pub type ChatStream = mpsc::Receiver<Result<String, ApiError>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// chat completion (streaming)
    async fn stream_chat(&self, request: ChatRequest, model_id: &str)
        -> Result<ChatStream, ApiError>;

    /// generate embeddings, one vector per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
