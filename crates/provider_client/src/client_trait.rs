//! The narrow interface the orchestration core uses to reach the model
//! provider. Implementations own transport details; the core only sees
//! normalized responses and chunk sequences.

use crate::api::models::{ChatCompletionResponse, CompletionChunk, ModelInvocationArgs};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Ordered, finite, non-restartable sequence of provider chunks.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<CompletionChunk, ProviderError>> + Send>>;

/// A batched response plus the provider-assigned correlation id, taken
/// from the response headers when present.
#[derive(Debug)]
pub struct ProviderResponse {
    pub completion: ChatCompletionResponse,
    pub correlation_id: Option<String>,
}

/// A chunk sequence plus the correlation id captured before streaming
/// began.
pub struct ProviderStream {
    pub chunks: ChunkStream,
    pub correlation_id: Option<String>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Invoke the model and wait for the full completion.
    async fn complete(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Invoke the model and return its incremental output in arrival
    /// order. Dropping the stream cancels the upstream request.
    async fn complete_stream(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderStream, ProviderError>;
}
