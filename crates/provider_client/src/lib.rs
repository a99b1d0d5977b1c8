//! Clients for reaching the model provider.
//!
//! Two invocation styles are supported: direct chat completion against
//! the provider (with optional retrieval extension) and the delegated
//! flow service, which receives the last question plus chat history and
//! answers with its own field names.

pub mod api;
pub mod client_trait;
pub mod error;
pub mod flow;
pub mod redaction;

pub use api::client::ModelProviderClient;
pub use api::models::{
    ChatCompletionResponse, Choice, ChoiceMessage, Citation, CompletionChunk,
    ModelInvocationArgs, ResponseContext,
};
pub use client_trait::{ChunkStream, ModelClient, ProviderResponse, ProviderStream};
pub use error::ProviderError;
pub use flow::{FlowClient, FlowReply};
pub use redaction::{redact_invocation_args, SECRET_FIELDS, SECRET_MASK};
