//! Turn assembly: incoming messages to model invocation arguments.

use std::sync::Arc;

use log::debug;

use chat_core::identity::CallerIdentity;
use chat_core::message::{ContentPart, IncomingMessage, OutboundMessage, Role};
use chat_core::settings::AppSettings;
use provider_client::{redact_invocation_args, ModelInvocationArgs};
use retrieval_config::{BackendKind, DataSourceBuilder};

use crate::error::TurnError;

/// Drop `tool` messages before dispatch. They exist only for persisted
/// history and are never sent to the model on this code path. Applied
/// once, upstream of both dispatch modes.
pub fn filter_tool_messages(messages: &[IncomingMessage]) -> Vec<IncomingMessage> {
    messages
        .iter()
        .filter(|m| m.role != Role::Tool)
        .cloned()
        .collect()
}

pub struct RequestAssembler {
    settings: Arc<AppSettings>,
}

impl RequestAssembler {
    pub fn new(settings: Arc<AppSettings>) -> Self {
        Self { settings }
    }

    pub fn retrieval_enabled(&self) -> bool {
        BackendKind::select(&self.settings).is_some()
    }

    /// Build the invocation arguments for one turn.
    ///
    /// The filtered messages collapse into exactly one outbound message:
    /// image-tagged entries become image-url parts, other non-empty
    /// entries become text parts, and the whole list is carried under the
    /// last message's role. When retrieval is disabled a system message
    /// carrying the configured prompt is prepended; when enabled, the
    /// prompt travels inside the retrieval extension instead.
    pub fn assemble(
        &self,
        caller: &CallerIdentity,
        messages: &[IncomingMessage],
        conversation_id: Option<&str>,
        stream: bool,
    ) -> Result<ModelInvocationArgs, TurnError> {
        let retrieval_enabled = self.retrieval_enabled();

        let mut outbound = Vec::new();
        if !retrieval_enabled {
            outbound.push(OutboundMessage::system(
                self.settings.model.system_message.clone(),
            ));
        }

        let mut parts = Vec::new();
        let mut last_role = None;
        for message in messages {
            if message.content.is_empty() {
                continue;
            }
            if message.is_image() {
                parts.push(ContentPart::image_url(message.content.clone()));
            } else {
                parts.push(ContentPart::text(message.content.clone()));
            }
            last_role = Some(message.role);
        }
        let role = last_role
            .ok_or_else(|| TurnError::Validation("messages are required".to_string()))?;
        outbound.push(OutboundMessage::with_parts(role, parts));

        let data_sources = if retrieval_enabled {
            let source = DataSourceBuilder::new(&self.settings).build(caller, conversation_id)?;
            Some(vec![source])
        } else {
            None
        };

        let model = self.settings.model.model.clone().ok_or_else(|| {
            TurnError::Configuration("MODEL_NAME is required".to_string())
        })?;

        let args = ModelInvocationArgs {
            messages: outbound,
            temperature: self.settings.model.temperature,
            max_tokens: self.settings.model.max_tokens,
            top_p: self.settings.model.top_p,
            stop: self.settings.model.stop_sequence.clone(),
            stream,
            model,
            user: None,
            data_sources,
        };
        debug!("assembled model args: {:?}", redact_invocation_args(&args));
        Ok(args)
    }
}
