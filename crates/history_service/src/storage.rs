//! Conversation storage trait and the file-backed implementation

use crate::error::{HistoryError, Result};
use crate::structs::{ConversationRecord, MessageRecord};
use async_trait::async_trait;
use chat_core::message::IncomingMessage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Conversation store trait
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Verify the store is reachable and writable.
    async fn ensure(&self) -> Result<()>;

    /// Create a new conversation for a user.
    async fn create_conversation(&self, user_id: &str, title: &str) -> Result<ConversationRecord>;

    /// Overwrite a conversation's metadata.
    async fn upsert_conversation(&self, conversation: &ConversationRecord) -> Result<()>;

    /// Load one conversation.
    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationRecord>;

    /// List a user's conversations, most recently updated first.
    async fn list_conversations(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>>;

    /// Delete a conversation and its messages.
    async fn delete_conversation(&self, user_id: &str, conversation_id: &str) -> Result<()>;

    /// Append a message to a conversation and bump its updated time.
    async fn create_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &IncomingMessage,
    ) -> Result<MessageRecord>;

    /// All messages of a conversation in insertion order.
    async fn get_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>>;

    /// Remove every message of a conversation, keeping the conversation.
    /// Returns how many were removed.
    async fn delete_messages(&self, user_id: &str, conversation_id: &str) -> Result<usize>;

    /// Attach feedback to a stored message.
    async fn update_message_feedback(
        &self,
        user_id: &str,
        message_id: &str,
        feedback: &str,
    ) -> Result<MessageRecord>;
}

/// On-disk shape of one conversation file.
#[derive(Debug, Serialize, Deserialize)]
struct ConversationFile {
    conversation: ConversationRecord,
    messages: Vec<MessageRecord>,
}

/// File-based conversation store. One JSON file per conversation under
/// `{base_path}/{user_id}/{conversation_id}.json`.
///
/// Files are rewritten whole on every mutation; concurrent writers to the
/// same conversation resolve last-write-wins.
#[derive(Clone)]
pub struct FileConversationStore {
    base_path: PathBuf,
}

impl FileConversationStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.base_path.join(user_id)
    }

    fn conversation_path(&self, user_id: &str, conversation_id: &str) -> PathBuf {
        self.user_dir(user_id).join(format!("{conversation_id}.json"))
    }

    async fn load(&self, user_id: &str, conversation_id: &str) -> Result<ConversationFile> {
        let path = self.conversation_path(user_id, conversation_id);
        if !path.exists() {
            return Err(HistoryError::NotFound(format!(
                "conversation {conversation_id} not found"
            )));
        }
        let contents = fs::read_to_string(&path).await?;
        let file: ConversationFile = serde_json::from_str(&contents)?;
        Ok(file)
    }

    async fn save(&self, file: &ConversationFile) -> Result<()> {
        let dir = self.user_dir(&file.conversation.user_id);
        fs::create_dir_all(&dir).await?;
        let path = self.conversation_path(&file.conversation.user_id, &file.conversation.id);
        let contents = serde_json::to_string_pretty(file)?;
        fs::write(&path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn ensure(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(HistoryError::NotConfigured(
                "history store path is empty".to_string(),
            ));
        }
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| HistoryError::Storage(format!("history store is not writable: {e}")))?;
        Ok(())
    }

    async fn create_conversation(&self, user_id: &str, title: &str) -> Result<ConversationRecord> {
        let conversation = ConversationRecord::new(user_id, title);
        let file = ConversationFile {
            conversation: conversation.clone(),
            messages: Vec::new(),
        };
        self.save(&file).await?;
        Ok(conversation)
    }

    async fn upsert_conversation(&self, conversation: &ConversationRecord) -> Result<()> {
        let mut file = self
            .load(&conversation.user_id, &conversation.id)
            .await
            .unwrap_or(ConversationFile {
                conversation: conversation.clone(),
                messages: Vec::new(),
            });
        file.conversation = conversation.clone();
        self.save(&file).await
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationRecord> {
        Ok(self.load(user_id, conversation_id).await?.conversation)
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>> {
        let dir = self.user_dir(user_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut conversations = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            let file: ConversationFile = serde_json::from_str(&contents)?;
            conversations.push(file.conversation);
        }

        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_conversation(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        let path = self.conversation_path(user_id, conversation_id);
        if !path.exists() {
            return Err(HistoryError::NotFound(format!(
                "conversation {conversation_id} not found"
            )));
        }
        fs::remove_file(&path).await?;
        Ok(())
    }

    async fn create_message(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &IncomingMessage,
    ) -> Result<MessageRecord> {
        let mut file = self.load(user_id, conversation_id).await?;
        let record = MessageRecord::from_incoming(user_id, conversation_id, message);
        file.messages.push(record.clone());
        file.conversation.touch();
        self.save(&file).await?;
        Ok(record)
    }

    async fn get_messages(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Vec<MessageRecord>> {
        Ok(self.load(user_id, conversation_id).await?.messages)
    }

    async fn delete_messages(&self, user_id: &str, conversation_id: &str) -> Result<usize> {
        let mut file = self.load(user_id, conversation_id).await?;
        let removed = file.messages.len();
        file.messages.clear();
        self.save(&file).await?;
        Ok(removed)
    }

    async fn update_message_feedback(
        &self,
        user_id: &str,
        message_id: &str,
        feedback: &str,
    ) -> Result<MessageRecord> {
        let dir = self.user_dir(user_id);
        if dir.exists() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let contents = fs::read_to_string(&path).await?;
                let mut file: ConversationFile = serde_json::from_str(&contents)?;
                if let Some(record) = file.messages.iter_mut().find(|m| m.id == message_id) {
                    record.feedback = Some(feedback.to_string());
                    record.updated_at = chrono::Utc::now();
                    let updated = record.clone();
                    self.save(&file).await?;
                    return Ok(updated);
                }
            }
        }
        Err(HistoryError::NotFound(format!(
            "message {message_id} not found"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_and_load_conversation() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let created = store.create_conversation("user-1", "Refunds").await.unwrap();
        let loaded = store.get_conversation("user-1", &created.id).await.unwrap();
        assert_eq!(created, loaded);
    }

    #[tokio::test]
    async fn test_get_missing_conversation_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let result = store.get_conversation("user-1", "nope").await;
        assert!(matches!(result, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_messages_round_trip_in_order() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let conversation = store.create_conversation("user-1", "t").await.unwrap();
        store
            .create_message("user-1", &conversation.id, &IncomingMessage::user("q"))
            .await
            .unwrap();
        store
            .create_message("user-1", &conversation.id, &IncomingMessage::tool("cites"))
            .await
            .unwrap();
        store
            .create_message("user-1", &conversation.id, &IncomingMessage::assistant("a"))
            .await
            .unwrap();

        let messages = store.get_messages("user-1", &conversation.id).await.unwrap();
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "tool", "assistant"]);
    }

    #[tokio::test]
    async fn test_create_message_requires_conversation() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let result = store
            .create_message("user-1", "ghost", &IncomingMessage::user("q"))
            .await;
        assert!(matches!(result, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_and_paginated() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let first = store.create_conversation("user-1", "first").await.unwrap();
        let second = store.create_conversation("user-1", "second").await.unwrap();
        // Touch the older one so it sorts to the front.
        store
            .create_message("user-1", &first.id, &IncomingMessage::user("q"))
            .await
            .unwrap();

        let page = store.list_conversations("user-1", 0, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.id);

        let rest = store.list_conversations("user-1", 1, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, second.id);
    }

    #[tokio::test]
    async fn test_list_unknown_user_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let listed = store.list_conversations("ghost", 0, 10).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_second_delete_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let conversation = store.create_conversation("user-1", "t").await.unwrap();
        store
            .delete_conversation("user-1", &conversation.id)
            .await
            .unwrap();
        let again = store.delete_conversation("user-1", &conversation.id).await;
        assert!(matches!(again, Err(HistoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_messages_keeps_conversation() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let conversation = store.create_conversation("user-1", "t").await.unwrap();
        store
            .create_message("user-1", &conversation.id, &IncomingMessage::user("q"))
            .await
            .unwrap();

        let removed = store.delete_messages("user-1", &conversation.id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .get_messages("user-1", &conversation.id)
            .await
            .unwrap()
            .is_empty());
        assert!(store.get_conversation("user-1", &conversation.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_feedback_lands_on_the_right_message() {
        let dir = tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());

        let conversation = store.create_conversation("user-1", "t").await.unwrap();
        let mut assistant = IncomingMessage::assistant("a");
        assistant.id = Some("msg-1".to_string());
        store
            .create_message("user-1", &conversation.id, &assistant)
            .await
            .unwrap();

        let updated = store
            .update_message_feedback("user-1", "msg-1", "positive")
            .await
            .unwrap();
        assert_eq!(updated.feedback.as_deref(), Some("positive"));

        let missing = store
            .update_message_feedback("user-1", "ghost", "positive")
            .await;
        assert!(matches!(missing, Err(HistoryError::NotFound(_))));
    }
}
