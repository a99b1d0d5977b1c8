//! Wire response shapes handed to the routing layer.

use chat_core::message::HistoryMetadata;
use chrono::Utc;
use provider_client::{
    ChatCompletionResponse, CompletionChunk, FlowReply, ResponseContext,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChoice {
    pub message: WireMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ResponseContext>,
}

/// A complete (non-streaming) turn response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created: i64,
    pub choices: Vec<WireChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_metadata: Option<HistoryMetadata>,
    #[serde(rename = "apim-request-id", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ResponseContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChunkChoice {
    pub delta: WireDelta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One streamed record; serialized as a single NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChunk {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created: i64,
    pub choices: Vec<WireChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_metadata: Option<HistoryMetadata>,
    #[serde(rename = "apim-request-id", skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl WireChunk {
    /// A chunk carrying a finish reason ends the turn.
    pub fn is_terminal(&self) -> bool {
        self.choices.iter().any(|c| c.finish_reason.is_some())
    }
}

/// Normalize a batched provider response.
pub fn format_non_streaming_response(
    completion: &ChatCompletionResponse,
    history_metadata: Option<HistoryMetadata>,
    correlation_id: Option<&str>,
) -> WireResponse {
    let choices = completion
        .choices
        .iter()
        .map(|choice| WireChoice {
            message: WireMessage {
                role: choice
                    .message
                    .role
                    .clone()
                    .unwrap_or_else(|| "assistant".to_string()),
                content: choice.message.content.clone().unwrap_or_default(),
            },
            context: choice.message.context.clone(),
        })
        .collect();

    WireResponse {
        id: completion.id.clone(),
        model: completion.model.clone(),
        created: completion.created,
        choices,
        history_metadata,
        correlation_id: correlation_id.map(|c| c.to_string()),
    }
}

/// Normalize one streamed provider chunk.
pub fn format_chunk(
    chunk: &CompletionChunk,
    history_metadata: Option<HistoryMetadata>,
    correlation_id: Option<&str>,
) -> WireChunk {
    let choices = chunk
        .choices
        .iter()
        .map(|choice| WireChunkChoice {
            delta: WireDelta {
                role: choice.delta.role.clone(),
                content: choice.delta.content.clone(),
                context: choice.delta.context.clone(),
            },
            finish_reason: choice.finish_reason.clone(),
        })
        .collect();

    WireChunk {
        id: chunk.id.clone(),
        model: chunk.model.clone(),
        created: chunk.created,
        choices,
        history_metadata,
        correlation_id: correlation_id.map(|c| c.to_string()),
    }
}

/// Normalize a delegated-flow reply. The id is the triggering message's
/// id when the client supplied one, so the turn stays correlatable.
pub fn format_flow_response(
    reply: &FlowReply,
    history_metadata: Option<HistoryMetadata>,
) -> WireResponse {
    let context = if reply.citations.is_empty() {
        None
    } else {
        Some(ResponseContext {
            citations: reply.citations.clone(),
            intent: None,
        })
    };

    WireResponse {
        id: reply
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        model: None,
        created: Utc::now().timestamp(),
        choices: vec![WireChoice {
            message: WireMessage {
                role: "assistant".to_string(),
                content: reply.answer.clone(),
            },
            context,
        }],
        history_metadata,
        correlation_id: reply.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_client::{Choice, ChoiceMessage, Citation};

    #[test]
    fn batched_response_keeps_context_and_correlation_id() {
        let completion = ChatCompletionResponse {
            id: "cmpl-1".to_string(),
            model: Some("gpt-test".to_string()),
            created: 1700000000,
            choices: vec![Choice {
                message: ChoiceMessage {
                    role: Some("assistant".to_string()),
                    content: Some("30 days.".to_string()),
                    context: Some(ResponseContext {
                        citations: vec![Citation {
                            title: Some("Refunds".to_string()),
                            ..Citation::default()
                        }],
                        intent: None,
                    }),
                },
                finish_reason: Some("stop".to_string()),
            }],
        };

        let wire = format_non_streaming_response(&completion, None, Some("corr-1"));
        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["apim-request-id"], "corr-1");
        assert_eq!(value["choices"][0]["message"]["content"], "30 days.");
        assert_eq!(
            value["choices"][0]["context"]["citations"][0]["title"],
            "Refunds"
        );
    }

    #[test]
    fn chunk_with_finish_reason_is_terminal() {
        let raw = r#"{"id":"c1","created":1,"choices":[{"delta":{"content":"x"},"finish_reason":"stop"}]}"#;
        let chunk: CompletionChunk = serde_json::from_str(raw).unwrap();
        assert!(format_chunk(&chunk, None, None).is_terminal());

        let raw = r#"{"id":"c1","created":1,"choices":[{"delta":{"content":"x"}}]}"#;
        let chunk: CompletionChunk = serde_json::from_str(raw).unwrap();
        assert!(!format_chunk(&chunk, None, None).is_terminal());
    }

    #[test]
    fn flow_reply_without_citations_has_no_context() {
        let reply = FlowReply {
            id: Some("msg-9".to_string()),
            answer: "Gift cards are non-refundable.".to_string(),
            citations: Vec::new(),
        };
        let wire = format_flow_response(&reply, None);
        assert_eq!(wire.id, "msg-9");
        assert!(wire.choices[0].context.is_none());
    }
}
