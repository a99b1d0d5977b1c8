//! Turn dispatch to the model provider or the delegated flow.

use std::sync::Arc;

use chat_core::identity::CallerIdentity;
use chat_core::message::{HistoryMetadata, IncomingMessage};
use provider_client::{FlowClient, ModelClient, ProviderStream};

use crate::assembler::{filter_tool_messages, RequestAssembler};
use crate::error::TurnError;
use crate::response::{format_flow_response, format_non_streaming_response, WireResponse};

pub struct ChatDispatcher {
    assembler: RequestAssembler,
    model: Arc<dyn ModelClient>,
    flow: Option<Arc<FlowClient>>,
}

impl ChatDispatcher {
    pub fn new(assembler: RequestAssembler, model: Arc<dyn ModelClient>) -> Self {
        Self {
            assembler,
            model,
            flow: None,
        }
    }

    pub fn with_flow(mut self, flow: Arc<FlowClient>) -> Self {
        self.flow = Some(flow);
        self
    }

    /// Dispatch a turn and wait for the complete answer. In delegated
    /// mode the flow service owns the turn; otherwise the model provider
    /// is invoked directly with the assembled arguments.
    pub async fn complete_turn(
        &self,
        caller: &CallerIdentity,
        messages: &[IncomingMessage],
        conversation_id: Option<&str>,
        history_metadata: Option<HistoryMetadata>,
    ) -> Result<WireResponse, TurnError> {
        let filtered = filter_tool_messages(messages);

        if let Some(flow) = &self.flow {
            let reply = flow.converse(&filtered).await?;
            return Ok(format_flow_response(&reply, history_metadata));
        }

        let args = self
            .assembler
            .assemble(caller, &filtered, conversation_id, false)?;
        let response = self.model.complete(&args).await?;
        Ok(format_non_streaming_response(
            &response.completion,
            history_metadata,
            response.correlation_id.as_deref(),
        ))
    }

    /// Dispatch a turn as a chunk stream. The delegated flow has no
    /// streaming surface, so streamed turns always go to the provider
    /// directly.
    pub async fn stream_turn(
        &self,
        caller: &CallerIdentity,
        messages: &[IncomingMessage],
        conversation_id: Option<&str>,
    ) -> Result<ProviderStream, TurnError> {
        let filtered = filter_tool_messages(messages);
        let args = self
            .assembler
            .assemble(caller, &filtered, conversation_id, true)?;
        Ok(self.model.complete_stream(&args).await?)
    }
}
