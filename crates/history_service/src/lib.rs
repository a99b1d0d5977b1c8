//! Conversation history persistence.
//!
//! A conversation owns an ordered list of messages; both belong to
//! exactly one user. The [`ConversationStore`] trait hides the backing
//! store, [`HistoryService`] implements the lifecycle rules on top of it.

pub mod cleanup;
pub mod error;
pub mod service;
pub mod storage;
pub mod structs;

pub use cleanup::{ArtifactCleanup, NoopCleanup};
pub use error::{HistoryError, Result};
pub use service::{HistoryService, TitleGenerator};
pub use storage::{ConversationStore, FileConversationStore, DEFAULT_PAGE_SIZE};
pub use structs::{ConversationRecord, MessageRecord};
