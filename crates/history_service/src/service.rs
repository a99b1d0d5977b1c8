//! Conversation lifecycle on top of the store.
//!
//! This is where turn persistence rules live: which message opens a
//! conversation, how assistant turns and their tool messages are ordered,
//! and what a delete cascades to.

use std::sync::Arc;

use log::{info, warn};

use chat_core::identity::CallerIdentity;
use chat_core::message::{IncomingMessage, OutboundMessage, Role};
use chat_core::settings::HistorySettings;
use provider_client::{ModelClient, ModelInvocationArgs};

use crate::cleanup::ArtifactCleanup;
use crate::error::{HistoryError, Result};
use crate::storage::{ConversationStore, DEFAULT_PAGE_SIZE};
use crate::structs::{ConversationRecord, MessageRecord};

const TITLE_PROMPT: &str = "Summarize the conversation so far into a 4-word or less title. \
    Do not use any quotation marks or punctuation. \
    Respond with a json object in the format {\"title\": string}.";
const TITLE_MAX_TOKENS: u32 = 64;
const TITLE_TEMPERATURE: f32 = 1.0;
const FALLBACK_TITLE_CHARS: usize = 40;
const FALLBACK_TITLE: &str = "New conversation";

/// Tag under which derived artifacts reference their conversation.
const CONVERSATION_TAG: &str = "conversation_id";

/// Model access used only for naming new conversations.
pub struct TitleGenerator {
    pub client: Arc<dyn ModelClient>,
    pub model: String,
}

pub struct HistoryService {
    store: Arc<dyn ConversationStore>,
    settings: HistorySettings,
    title_generator: Option<TitleGenerator>,
    cleanup: Option<Arc<dyn ArtifactCleanup>>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn ConversationStore>, settings: HistorySettings) -> Self {
        Self {
            store,
            settings,
            title_generator: None,
            cleanup: None,
        }
    }

    pub fn with_title_generator(mut self, generator: TitleGenerator) -> Self {
        self.title_generator = Some(generator);
        self
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn ArtifactCleanup>) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Verify the store is usable. Surfaces the store's own diagnostic so
    /// the routing layer can distinguish a missing configuration from a
    /// broken one.
    pub async fn ensure(&self) -> Result<()> {
        self.store.ensure().await
    }

    /// Create-or-append for a turn: resolve the conversation (creating and
    /// titling a new one when no id is given) and persist the turn's last
    /// user message into it.
    pub async fn ensure_conversation(
        &self,
        identity: &CallerIdentity,
        conversation_id: Option<&str>,
        messages: &[IncomingMessage],
    ) -> Result<(ConversationRecord, MessageRecord)> {
        let user_message = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| HistoryError::Validation("no user message found".to_string()))?;

        let conversation = match conversation_id {
            Some(id) => self.store.get_conversation(&identity.user_id, id).await?,
            None => {
                let title = self.generate_title(messages).await;
                info!("creating conversation titled {title:?}");
                self.store
                    .create_conversation(&identity.user_id, &title)
                    .await?
            }
        };

        let record = self
            .store
            .create_message(&identity.user_id, &conversation.id, user_message)
            .await?;
        Ok((conversation, record))
    }

    /// Persist the assistant's half of a turn. Tool messages carrying the
    /// retrieval context are written first so readers always see them
    /// before the answer they support.
    pub async fn append_assistant_turn(
        &self,
        identity: &CallerIdentity,
        conversation_id: &str,
        tool_messages: &[IncomingMessage],
        assistant: &IncomingMessage,
    ) -> Result<MessageRecord> {
        for tool_message in tool_messages {
            self.store
                .create_message(&identity.user_id, conversation_id, tool_message)
                .await?;
        }
        self.store
            .create_message(&identity.user_id, conversation_id, assistant)
            .await
    }

    pub async fn list(
        &self,
        identity: &CallerIdentity,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<ConversationRecord>> {
        self.store
            .list_conversations(
                &identity.user_id,
                offset,
                limit.unwrap_or(DEFAULT_PAGE_SIZE),
            )
            .await
    }

    pub async fn read(
        &self,
        identity: &CallerIdentity,
        conversation_id: &str,
    ) -> Result<(ConversationRecord, Vec<MessageRecord>)> {
        let conversation = self
            .store
            .get_conversation(&identity.user_id, conversation_id)
            .await?;
        let messages = self
            .store
            .get_messages(&identity.user_id, conversation_id)
            .await?;
        Ok((conversation, messages))
    }

    pub async fn rename(
        &self,
        identity: &CallerIdentity,
        conversation_id: &str,
        title: &str,
    ) -> Result<ConversationRecord> {
        if title.trim().is_empty() {
            return Err(HistoryError::Validation("title is required".to_string()));
        }
        let mut conversation = self
            .store
            .get_conversation(&identity.user_id, conversation_id)
            .await?;
        conversation.title = title.to_string();
        conversation.touch();
        self.store.upsert_conversation(&conversation).await?;
        Ok(conversation)
    }

    pub async fn message_feedback(
        &self,
        identity: &CallerIdentity,
        message_id: &str,
        feedback: &str,
    ) -> Result<MessageRecord> {
        if !self.settings.enable_feedback {
            return Err(HistoryError::Validation(
                "message feedback is disabled".to_string(),
            ));
        }
        self.store
            .update_message_feedback(&identity.user_id, message_id, feedback)
            .await
    }

    /// Delete a conversation: messages first, then the conversation, then
    /// any derived artifacts tagged with its id.
    pub async fn delete(&self, identity: &CallerIdentity, conversation_id: &str) -> Result<()> {
        self.store
            .delete_messages(&identity.user_id, conversation_id)
            .await?;
        self.store
            .delete_conversation(&identity.user_id, conversation_id)
            .await?;

        if self.settings.cascade_cleanup {
            if let Some(cleanup) = &self.cleanup {
                let removed = cleanup
                    .delete_by_tag(CONVERSATION_TAG, conversation_id)
                    .await?;
                info!("removed {removed} artifacts for conversation {conversation_id}");
            }
        }
        Ok(())
    }

    /// Delete every conversation the user owns.
    pub async fn delete_all(&self, identity: &CallerIdentity) -> Result<()> {
        loop {
            let page = self
                .store
                .list_conversations(&identity.user_id, 0, DEFAULT_PAGE_SIZE)
                .await?;
            if page.is_empty() {
                return Ok(());
            }
            for conversation in page {
                self.delete(identity, &conversation.id).await?;
            }
        }
    }

    /// Empty a conversation without deleting it.
    pub async fn clear_messages(
        &self,
        identity: &CallerIdentity,
        conversation_id: &str,
    ) -> Result<usize> {
        self.store
            .delete_messages(&identity.user_id, conversation_id)
            .await
    }

    /// Name a new conversation from its opening messages. Any failure
    /// falls back to a title derived from the opening user message; title
    /// generation never fails a turn.
    async fn generate_title(&self, messages: &[IncomingMessage]) -> String {
        if let Some(generator) = &self.title_generator {
            match self.request_title(generator, messages).await {
                Ok(title) => return title,
                Err(e) => warn!("title generation failed, using fallback: {e}"),
            }
        }
        fallback_title(messages)
    }

    async fn request_title(
        &self,
        generator: &TitleGenerator,
        messages: &[IncomingMessage],
    ) -> Result<String> {
        let mut outbound: Vec<OutboundMessage> = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| OutboundMessage {
                role: Role::User,
                content: chat_core::message::OutboundContent::Text(m.content.clone()),
            })
            .collect();
        outbound.push(OutboundMessage {
            role: Role::User,
            content: chat_core::message::OutboundContent::Text(TITLE_PROMPT.to_string()),
        });

        let args = ModelInvocationArgs {
            messages: outbound,
            temperature: TITLE_TEMPERATURE,
            max_tokens: TITLE_MAX_TOKENS,
            top_p: 1.0,
            stop: None,
            stream: false,
            model: generator.model.clone(),
            user: None,
            data_sources: None,
        };

        let response = generator
            .client
            .complete(&args)
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        let content = response
            .completion
            .first_content()
            .ok_or_else(|| HistoryError::Storage("empty title completion".to_string()))?;
        let parsed: serde_json::Value = serde_json::from_str(content)?;
        parsed
            .get("title")
            .and_then(|t| t.as_str())
            .map(|t| t.to_string())
            .ok_or_else(|| HistoryError::Storage("title completion missing field".to_string()))
    }
}

fn fallback_title(messages: &[IncomingMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| {
            let text = m.content.trim();
            if text.chars().count() > FALLBACK_TITLE_CHARS {
                text.chars().take(FALLBACK_TITLE_CHARS).collect()
            } else {
                text.to_string()
            }
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileConversationStore;
    use async_trait::async_trait;
    use provider_client::{
        ChatCompletionResponse, Choice, ChoiceMessage, ProviderError, ProviderResponse,
        ProviderStream,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn settings() -> HistorySettings {
        HistorySettings {
            store_path: "unused".into(),
            enable_feedback: true,
            cascade_cleanup: true,
        }
    }

    fn service(dir: &std::path::Path) -> HistoryService {
        HistoryService::new(Arc::new(FileConversationStore::new(dir)), settings())
    }

    fn identity() -> CallerIdentity {
        CallerIdentity::new("user-1")
    }

    struct CannedTitleClient {
        content: String,
    }

    #[async_trait]
    impl ModelClient for CannedTitleClient {
        async fn complete(
            &self,
            _args: &ModelInvocationArgs,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                completion: ChatCompletionResponse {
                    id: "cmpl-title".to_string(),
                    model: None,
                    created: 0,
                    choices: vec![Choice {
                        message: ChoiceMessage {
                            role: Some("assistant".to_string()),
                            content: Some(self.content.clone()),
                            context: None,
                        },
                        finish_reason: Some("stop".to_string()),
                    }],
                },
                correlation_id: None,
            })
        }

        async fn complete_stream(
            &self,
            _args: &ModelInvocationArgs,
        ) -> std::result::Result<ProviderStream, ProviderError> {
            Err(ProviderError::Transport("not used".to_string()))
        }
    }

    struct CountingCleanup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactCleanup for CountingCleanup {
        async fn delete_by_tag(&self, tag_name: &str, _tag_value: &str) -> Result<usize> {
            assert_eq!(tag_name, "conversation_id");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        }
    }

    #[tokio::test]
    async fn ensure_conversation_creates_with_generated_title() {
        let dir = tempdir().unwrap();
        let service = service(dir.path()).with_title_generator(TitleGenerator {
            client: Arc::new(CannedTitleClient {
                content: r#"{"title": "Refund policy"}"#.to_string(),
            }),
            model: "gpt-test".to_string(),
        });

        let turn = vec![IncomingMessage::user("What is the refund policy?")];
        let (conversation, message) = service
            .ensure_conversation(&identity(), None, &turn)
            .await
            .unwrap();
        assert_eq!(conversation.title, "Refund policy");
        assert_eq!(message.content, "What is the refund policy?");

        let (_, stored) = service.read(&identity(), &conversation.id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_title_falls_back_to_opening_message() {
        let dir = tempdir().unwrap();
        let service = service(dir.path()).with_title_generator(TitleGenerator {
            client: Arc::new(CannedTitleClient {
                content: "not json at all".to_string(),
            }),
            model: "gpt-test".to_string(),
        });

        let turn = vec![IncomingMessage::user("Do gift cards expire?")];
        let (conversation, _) = service
            .ensure_conversation(&identity(), None, &turn)
            .await
            .unwrap();
        assert_eq!(conversation.title, "Do gift cards expire?");
    }

    #[tokio::test]
    async fn long_fallback_title_is_truncated() {
        let long = "x".repeat(100);
        let title = fallback_title(&[IncomingMessage::user(long)]);
        assert_eq!(title.chars().count(), FALLBACK_TITLE_CHARS);
    }

    #[tokio::test]
    async fn turn_without_user_message_is_rejected() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        let turn = vec![IncomingMessage::assistant("unprompted")];
        let result = service.ensure_conversation(&identity(), None, &turn).await;
        assert!(matches!(result, Err(HistoryError::Validation(_))));
    }

    #[tokio::test]
    async fn ensure_conversation_with_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        let turn = vec![IncomingMessage::user("q")];
        let result = service
            .ensure_conversation(&identity(), Some("ghost"), &turn)
            .await;
        assert!(matches!(result, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn assistant_turn_keeps_tool_messages_first() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        let turn = vec![IncomingMessage::user("q")];
        let (conversation, _) = service
            .ensure_conversation(&identity(), None, &turn)
            .await
            .unwrap();

        let mut assistant = IncomingMessage::assistant("a");
        assistant.id = Some("assistant-1".to_string());
        service
            .append_assistant_turn(
                &identity(),
                &conversation.id,
                &[IncomingMessage::tool("{\"citations\": []}")],
                &assistant,
            )
            .await
            .unwrap();

        let (_, messages) = service.read(&identity(), &conversation.id).await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "tool", "assistant"]);
        assert_eq!(messages.last().unwrap().id, "assistant-1");
    }

    #[tokio::test]
    async fn feedback_is_rejected_when_disabled() {
        let dir = tempdir().unwrap();
        let mut disabled = settings();
        disabled.enable_feedback = false;
        let service = HistoryService::new(
            Arc::new(FileConversationStore::new(dir.path())),
            disabled,
        );

        let result = service
            .message_feedback(&identity(), "msg-1", "positive")
            .await;
        assert!(matches!(result, Err(HistoryError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_cascades_to_artifact_cleanup() {
        let dir = tempdir().unwrap();
        let cleanup = Arc::new(CountingCleanup {
            calls: AtomicUsize::new(0),
        });
        let service = service(dir.path()).with_cleanup(cleanup.clone());

        let turn = vec![IncomingMessage::user("q")];
        let (conversation, _) = service
            .ensure_conversation(&identity(), None, &turn)
            .await
            .unwrap();

        service.delete(&identity(), &conversation.id).await.unwrap();
        assert_eq!(cleanup.calls.load(Ordering::SeqCst), 1);

        let again = service.delete(&identity(), &conversation.id).await;
        assert!(matches!(again, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_all_clears_every_conversation() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        for question in ["a", "b", "c"] {
            service
                .ensure_conversation(&identity(), None, &[IncomingMessage::user(question)])
                .await
                .unwrap();
        }
        service.delete_all(&identity()).await.unwrap();
        assert!(service.list(&identity(), 0, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_rejects_blank_title() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());

        let (conversation, _) = service
            .ensure_conversation(&identity(), None, &[IncomingMessage::user("q")])
            .await
            .unwrap();
        let result = service.rename(&identity(), &conversation.id, "  ").await;
        assert!(matches!(result, Err(HistoryError::Validation(_))));

        let renamed = service
            .rename(&identity(), &conversation.id, "Gift cards")
            .await
            .unwrap();
        assert_eq!(renamed.title, "Gift cards");
    }
}
