//! End-to-end turn flow against a scripted model provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_core::identity::CallerIdentity;
use chat_core::message::{IncomingMessage, Role, TurnRequest};
use chat_core::settings::AppSettings;
use history_service::{FileConversationStore, HistoryService};
use orchestrator::{ChatOrchestrator, TurnOutput, WireChunk};
use provider_client::{
    ChatCompletionResponse, Choice, ChoiceMessage, CompletionChunk, ModelClient,
    ModelInvocationArgs, ProviderError, ProviderResponse, ProviderStream,
};

const ANSWER: &str = "Our refund policy allows returns within 30 days.";

/// Provider double that answers every turn with the same text, either
/// whole or split into word-sized deltas.
struct ScriptedClient {
    seen: Mutex<Vec<ModelInvocationArgs>>,
}

impl ScriptedClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn complete(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(args.clone());
        Ok(ProviderResponse {
            completion: ChatCompletionResponse {
                id: "cmpl-1".to_string(),
                model: Some(args.model.clone()),
                created: 1,
                choices: vec![Choice {
                    message: ChoiceMessage {
                        role: Some("assistant".to_string()),
                        content: Some(ANSWER.to_string()),
                        context: None,
                    },
                    finish_reason: Some("stop".to_string()),
                }],
            },
            correlation_id: Some("corr-1".to_string()),
        })
    }

    async fn complete_stream(
        &self,
        args: &ModelInvocationArgs,
    ) -> Result<ProviderStream, ProviderError> {
        self.seen.lock().unwrap().push(args.clone());
        let words: Vec<String> = ANSWER
            .split_inclusive(' ')
            .map(|w| w.to_string())
            .collect();
        let last = words.len() - 1;
        let chunks: Vec<Result<CompletionChunk, ProviderError>> = words
            .into_iter()
            .enumerate()
            .map(|(i, word)| {
                Ok(serde_json::from_value(serde_json::json!({
                    "id": "chunk-1",
                    "created": 1,
                    "choices": [{
                        "delta": { "content": word },
                        "finish_reason": if i == last { Some("stop") } else { None },
                    }],
                }))
                .unwrap())
            })
            .collect();
        Ok(ProviderStream {
            chunks: Box::pin(futures::stream::iter(chunks)),
            correlation_id: Some("corr-1".to_string()),
        })
    }
}

fn settings(stream: bool) -> Arc<AppSettings> {
    let vars: HashMap<String, String> = [
        ("MODEL_ENDPOINT", "https://model.example.test"),
        ("MODEL_NAME", "gpt-test"),
        ("MODEL_STREAM", if stream { "true" } else { "false" }),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Arc::new(AppSettings::from_lookup(&move |name| vars.get(name).cloned()).unwrap())
}

fn history(dir: &std::path::Path) -> Arc<HistoryService> {
    Arc::new(HistoryService::new(
        Arc::new(FileConversationStore::new(dir)),
        chat_core::settings::HistorySettings {
            store_path: dir.to_path_buf(),
            enable_feedback: true,
            cascade_cleanup: false,
        },
    ))
}

fn caller() -> CallerIdentity {
    CallerIdentity::new("user-1")
}

#[tokio::test]
async fn first_turn_creates_conversation_and_persists_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new();
    let history = history(dir.path());
    let orchestrator = ChatOrchestrator::new(settings(false), client.clone())
        .unwrap()
        .with_history(history.clone());

    let request = TurnRequest::new(vec![IncomingMessage::user("What is the refund policy?")]);
    let output = orchestrator.generate_turn(&caller(), &request).await.unwrap();

    let response = match output {
        TurnOutput::Batched(response) => response,
        TurnOutput::Streaming(_) => panic!("expected a batched turn"),
    };
    assert_eq!(response.choices[0].message.content, ANSWER);

    // Conversation exists, titled from the question, with the user
    // message persisted before dispatch.
    let metadata = response.history_metadata.unwrap();
    let conversation_id = metadata.conversation_id.unwrap();
    assert_eq!(metadata.title.as_deref(), Some("What is the refund policy?"));
    let (_, messages) = history.read(&caller(), &conversation_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);

    // The model saw a single system+user pair.
    let seen = client.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].messages.len(), 2);
    assert_eq!(seen[0].messages[0].role, Role::System);
    assert_eq!(seen[0].messages[1].role, Role::User);
    drop(seen);

    // The client posts the finished turn back; the assistant lands last.
    let mut assistant = IncomingMessage::assistant(ANSWER);
    assistant.id = Some("assistant-1".to_string());
    orchestrator
        .update_turn(&caller(), &conversation_id, &[assistant])
        .await
        .unwrap();
    let (_, messages) = history.read(&caller(), &conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, ANSWER);
}

#[tokio::test]
async fn streamed_and_batched_turns_agree_on_the_answer() {
    let client = ScriptedClient::new();
    let request = TurnRequest::new(vec![IncomingMessage::user("What is the refund policy?")]);

    let batched = ChatOrchestrator::new(settings(false), client.clone()).unwrap();
    let batched_text = match batched.converse(&caller(), &request).await.unwrap() {
        TurnOutput::Batched(response) => response.choices[0].message.content.clone(),
        TurnOutput::Streaming(_) => panic!("expected a batched turn"),
    };

    let streaming = ChatOrchestrator::new(settings(true), client.clone()).unwrap();
    let mut rx = match streaming.converse(&caller(), &request).await.unwrap() {
        TurnOutput::Streaming(rx) => rx,
        TurnOutput::Batched(_) => panic!("expected a streamed turn"),
    };

    let mut streamed_text = String::new();
    let mut saw_terminal = false;
    while let Some(line) = rx.recv().await {
        let record: WireChunk = serde_json::from_str(&line).unwrap();
        assert_eq!(record.correlation_id.as_deref(), Some("corr-1"));
        if let Some(delta) = &record.choices[0].delta.content {
            streamed_text.push_str(delta);
        }
        saw_terminal = record.is_terminal();
    }

    assert!(saw_terminal);
    assert_eq!(streamed_text, batched_text);
}

#[tokio::test]
async fn update_turn_writes_tool_message_before_assistant() {
    let dir = tempfile::tempdir().unwrap();
    let client = ScriptedClient::new();
    let history = history(dir.path());
    let orchestrator = ChatOrchestrator::new(settings(false), client)
        .unwrap()
        .with_history(history.clone());

    let request = TurnRequest::new(vec![IncomingMessage::user("What is the refund policy?")]);
    let output = orchestrator.generate_turn(&caller(), &request).await.unwrap();
    let conversation_id = match output {
        TurnOutput::Batched(response) => response
            .history_metadata
            .unwrap()
            .conversation_id
            .unwrap(),
        TurnOutput::Streaming(_) => panic!("expected a batched turn"),
    };

    orchestrator
        .update_turn(
            &caller(),
            &conversation_id,
            &[
                IncomingMessage::user("What is the refund policy?"),
                IncomingMessage::tool("{\"citations\": [{\"title\": \"Refunds\"}]}"),
                IncomingMessage::assistant(ANSWER),
            ],
        )
        .await
        .unwrap();

    let (_, messages) = history.read(&caller(), &conversation_id).await.unwrap();
    let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
    assert_eq!(roles, vec!["user", "tool", "assistant"]);
}

#[tokio::test]
async fn update_turn_without_assistant_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = ChatOrchestrator::new(settings(false), ScriptedClient::new())
        .unwrap()
        .with_history(history(dir.path()));

    let result = orchestrator
        .update_turn(&caller(), "conv-1", &[IncomingMessage::user("q")])
        .await;
    assert!(matches!(result, Err(orchestrator::TurnError::Validation(_))));
}
