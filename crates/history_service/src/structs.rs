//! Persisted conversation data structures

use chat_core::message::{IncomingMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored conversation. Timestamps are serialized camelCase to match
/// the payloads clients already consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            kind: "conversation".to_string(),
            user_id: user_id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One stored message, in insertion order within its conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub user_id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl MessageRecord {
    /// Build a record from an incoming message. A client-supplied id is
    /// kept; otherwise one is assigned.
    pub fn from_incoming(
        user_id: &str,
        conversation_id: &str,
        message: &IncomingMessage,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: message
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: "message".to_string(),
            user_id: user_id.to_string(),
            conversation_id: conversation_id.to_string(),
            role: message.role,
            content: message.content.clone(),
            created_at: now,
            updated_at: now,
            feedback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_serializes_camel_case() {
        let record = ConversationRecord::new("user-1", "Refunds");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "conversation");
        assert_eq!(value["userId"], "user-1");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn message_keeps_client_supplied_id() {
        let mut incoming = IncomingMessage::assistant("answer");
        incoming.id = Some("msg-7".to_string());
        let record = MessageRecord::from_incoming("user-1", "conv-1", &incoming);
        assert_eq!(record.id, "msg-7");
        assert_eq!(record.role, Role::Assistant);
        assert!(record.feedback.is_none());
    }

    #[test]
    fn message_without_id_gets_one() {
        let incoming = IncomingMessage::user("question");
        let record = MessageRecord::from_incoming("user-1", "conv-1", &incoming);
        assert!(!record.id.is_empty());
    }
}
