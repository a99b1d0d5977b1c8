//! Delegated-flow client.
//!
//! When a deployed reasoning flow owns the turn, the conversation is
//! remapped into the flow's field names, posted as one request, and the
//! reply is normalized back into the common response shapes.

use std::time::Duration;

use log::{error, info};
use reqwest::Client;
use serde_json::{json, Value};

use chat_core::message::{IncomingMessage, Role};
use chat_core::settings::FlowSettings;

use crate::api::models::Citation;
use crate::error::ProviderError;

/// A normalized delegated-flow reply.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReply {
    /// Identifier of the turn, carried over from the triggering message.
    pub id: Option<String>,
    pub answer: String,
    pub citations: Vec<Citation>,
}

pub struct FlowClient {
    client: Client,
    endpoint: String,
    api_key: String,
    request_field: String,
    response_field: String,
    citations_field: String,
}

impl FlowClient {
    pub fn new(settings: &FlowSettings) -> Result<Self, ProviderError> {
        let endpoint = settings
            .endpoint
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("FLOW_ENDPOINT is required".to_string()))?;
        let api_key = settings
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("FLOW_API_KEY is required".to_string()))?;

        // The flow endpoint must answer within the configured bound; a
        // stuck flow is surfaced as a transport error instead of hanging
        // the turn.
        let client = Client::builder()
            .timeout(Duration::from_secs_f64(settings.response_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            request_field: settings.request_field.clone(),
            response_field: settings.response_field.clone(),
            citations_field: settings.citations_field.clone(),
        })
    }

    /// Remap the conversation into the flow's field names. Each user
    /// message opens a history entry; the following assistant message
    /// fills its output slot. The final (unanswered) entry is the live
    /// question and is excluded from history.
    fn chat_history(&self, messages: &[IncomingMessage]) -> Vec<Value> {
        let mut entries: Vec<Value> = Vec::new();
        for message in messages {
            match message.role {
                Role::User => entries.push(json!({
                    "inputs": { (self.request_field.as_str()): message.content },
                    "outputs": { (self.response_field.as_str()): "" },
                })),
                Role::Assistant => {
                    if let Some(last) = entries.last_mut() {
                        last["outputs"][self.response_field.as_str()] = json!(message.content);
                    }
                }
                _ => {}
            }
        }
        entries.pop();
        entries
    }

    /// Post the turn to the flow and normalize its reply.
    pub async fn converse(
        &self,
        messages: &[IncomingMessage],
    ) -> Result<FlowReply, ProviderError> {
        let question = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| ProviderError::Malformed("no user message in turn".to_string()))?;

        let body = json!({
            (self.request_field.as_str()): question.content,
            "chat_history": self.chat_history(messages),
        });

        info!("dispatching turn to delegated flow at {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("delegated flow request failed: {e}");
                ProviderError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("delegated flow returned status {status}: {message}");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: Value = response.json().await?;
        let answer = reply
            .get(&self.response_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ProviderError::Malformed(format!(
                    "flow reply missing field {:?}",
                    self.response_field
                ))
            })?
            .to_string();
        let citations = reply
            .get(&self.citations_field)
            .and_then(|v| v.as_array())
            .map(|docs| docs.iter().map(Citation::from_value).collect())
            .unwrap_or_default();

        Ok(FlowReply {
            id: question.id.clone(),
            answer,
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: &str) -> FlowSettings {
        FlowSettings {
            use_flow: true,
            endpoint: Some(endpoint.to_string()),
            api_key: Some("flow-secret".to_string()),
            response_timeout_secs: 30.0,
            request_field: "question".to_string(),
            response_field: "reply".to_string(),
            citations_field: "documents".to_string(),
        }
    }

    fn turn() -> Vec<IncomingMessage> {
        vec![
            IncomingMessage::user("What is the refund policy?"),
            IncomingMessage::assistant("Refunds are honored within 30 days."),
            IncomingMessage::user("What about gift cards?"),
        ]
    }

    #[test]
    fn missing_endpoint_is_a_configuration_error() {
        let mut incomplete = settings("https://flow.example.test");
        incomplete.endpoint = None;
        assert!(matches!(
            FlowClient::new(&incomplete),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn history_pairs_user_and_assistant_and_drops_live_question() {
        let client = FlowClient::new(&settings("https://flow.example.test")).unwrap();
        let history = client.chat_history(&turn());
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0]["inputs"]["question"],
            "What is the refund policy?"
        );
        assert_eq!(
            history[0]["outputs"]["reply"],
            "Refunds are honored within 30 days."
        );
    }

    #[tokio::test]
    async fn converse_sends_remapped_body_and_normalizes_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer flow-secret"))
            .and(body_partial_json(json!({
                "question": "What about gift cards?",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": "Gift cards are non-refundable.",
                "documents": [{"title": "Gift card terms", "content": "terms text"}],
            })))
            .mount(&server)
            .await;

        let client = FlowClient::new(&settings(&server.uri())).unwrap();
        let reply = client.converse(&turn()).await.unwrap();
        assert_eq!(reply.answer, "Gift cards are non-refundable.");
        assert_eq!(reply.citations.len(), 1);
        assert_eq!(reply.citations[0].title.as_deref(), Some("Gift card terms"));
    }

    #[tokio::test]
    async fn flow_error_status_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("flow crashed"))
            .mount(&server)
            .await;

        let client = FlowClient::new(&settings(&server.uri())).unwrap();
        let err = client.converse(&turn()).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn reply_missing_response_field_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let client = FlowClient::new(&settings(&server.uri())).unwrap();
        assert!(matches!(
            client.converse(&turn()).await,
            Err(ProviderError::Malformed(_))
        ));
    }
}
