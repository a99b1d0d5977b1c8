//! Chat turn orchestration.
//!
//! Ties the layers together: assemble the model invocation (attaching
//! retrieval when a backend is configured), dispatch it directly or via
//! the delegated flow, stream the answer as NDJSON records, and keep the
//! conversation history in step with the turn.

pub mod assembler;
pub mod dispatcher;
pub mod error;
pub mod response;
pub mod stream;
pub mod turn;

pub use assembler::{filter_tool_messages, RequestAssembler};
pub use dispatcher::ChatDispatcher;
pub use error::TurnError;
pub use response::{
    format_chunk, format_flow_response, format_non_streaming_response, WireChoice, WireChunk,
    WireChunkChoice, WireDelta, WireMessage, WireResponse,
};
pub use stream::{StreamAggregator, NDJSON_CONTENT_TYPE};
pub use turn::{ChatOrchestrator, TurnOutput};
