//! Top-level turn coordination.
//!
//! Two entry points: `converse` runs a stateless turn, `generate_turn`
//! additionally resolves the conversation and durably appends the user
//! message before dispatch begins. The assistant half of a turn is
//! persisted separately through `update_turn` once the full answer is
//! known, so streamed turns never hold a write open across the stream.

use std::sync::Arc;

use tokio::sync::mpsc;

use chat_core::identity::CallerIdentity;
use chat_core::message::{HistoryMetadata, IncomingMessage, Role, TurnRequest};
use chat_core::settings::AppSettings;
use history_service::HistoryService;
use provider_client::{FlowClient, ModelClient};

use crate::assembler::RequestAssembler;
use crate::dispatcher::ChatDispatcher;
use crate::error::TurnError;
use crate::response::WireResponse;
use crate::stream::StreamAggregator;

/// The outcome of a dispatched turn.
pub enum TurnOutput {
    Batched(WireResponse),
    /// NDJSON records in provider emission order; the channel closing
    /// signals end of turn.
    Streaming(mpsc::Receiver<String>),
}

pub struct ChatOrchestrator {
    settings: Arc<AppSettings>,
    dispatcher: ChatDispatcher,
    history: Option<Arc<HistoryService>>,
}

impl ChatOrchestrator {
    pub fn new(
        settings: Arc<AppSettings>,
        model: Arc<dyn ModelClient>,
    ) -> Result<Self, TurnError> {
        let assembler = RequestAssembler::new(settings.clone());
        let mut dispatcher = ChatDispatcher::new(assembler, model);
        if settings.flow.use_flow {
            let flow = FlowClient::new(&settings.flow)?;
            dispatcher = dispatcher.with_flow(Arc::new(flow));
        }
        Ok(Self {
            settings,
            dispatcher,
            history: None,
        })
    }

    pub fn with_history(mut self, history: Arc<HistoryService>) -> Self {
        self.history = Some(history);
        self
    }

    /// Run one turn without touching history.
    pub async fn converse(
        &self,
        caller: &CallerIdentity,
        request: &TurnRequest,
    ) -> Result<TurnOutput, TurnError> {
        self.dispatch(caller, &request.messages, request.history_metadata.clone())
            .await
    }

    /// Run one turn against a conversation: resolve or create the
    /// conversation, durably append the turn's user message, then
    /// dispatch. The response envelope echoes the conversation metadata
    /// so the client can address follow-up turns.
    pub async fn generate_turn(
        &self,
        caller: &CallerIdentity,
        request: &TurnRequest,
    ) -> Result<TurnOutput, TurnError> {
        let history = self.history()?;
        let conversation_id = request
            .history_metadata
            .as_ref()
            .and_then(|m| m.conversation_id.clone());
        let (conversation, _) = history
            .ensure_conversation(caller, conversation_id.as_deref(), &request.messages)
            .await?;

        let metadata = HistoryMetadata {
            conversation_id: Some(conversation.id.clone()),
            title: Some(conversation.title.clone()),
            date: Some(conversation.created_at.to_rfc3339()),
        };
        self.dispatch(caller, &request.messages, Some(metadata))
            .await
    }

    /// Persist the assistant half of a finished turn. The message list
    /// must end with the assistant message; a tool message immediately
    /// before it is written first.
    pub async fn update_turn(
        &self,
        caller: &CallerIdentity,
        conversation_id: &str,
        messages: &[IncomingMessage],
    ) -> Result<(), TurnError> {
        let history = self.history()?;
        let assistant = match messages.last() {
            Some(m) if m.role == Role::Assistant => m,
            _ => {
                return Err(TurnError::Validation(
                    "no assistant message found".to_string(),
                ))
            }
        };
        let tool: &[IncomingMessage] = match messages.len().checked_sub(2) {
            Some(i) if messages[i].role == Role::Tool => std::slice::from_ref(&messages[i]),
            _ => &[],
        };
        history
            .append_assistant_turn(caller, conversation_id, tool, assistant)
            .await?;
        Ok(())
    }

    async fn dispatch(
        &self,
        caller: &CallerIdentity,
        messages: &[IncomingMessage],
        metadata: Option<HistoryMetadata>,
    ) -> Result<TurnOutput, TurnError> {
        let conversation_id = metadata
            .as_ref()
            .and_then(|m| m.conversation_id.as_deref().map(|id| id.to_string()));

        if self.settings.model.stream && !self.settings.flow.use_flow {
            let stream = self
                .dispatcher
                .stream_turn(caller, messages, conversation_id.as_deref())
                .await?;
            Ok(TurnOutput::Streaming(StreamAggregator::spawn(
                stream, metadata,
            )))
        } else {
            let response = self
                .dispatcher
                .complete_turn(caller, messages, conversation_id.as_deref(), metadata)
                .await?;
            Ok(TurnOutput::Batched(response))
        }
    }

    fn history(&self) -> Result<&Arc<HistoryService>, TurnError> {
        self.history.as_ref().ok_or_else(|| {
            TurnError::Configuration("conversation history is not configured".to_string())
        })
    }
}
