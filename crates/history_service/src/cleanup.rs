//! Cleanup hook for artifacts indexed outside the conversation store.
//!
//! Uploaded-document embeddings and similar derived artifacts are tagged
//! with the conversation id at ingestion time. Deleting a conversation
//! asks the hook to drop everything carrying that tag.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ArtifactCleanup: Send + Sync {
    /// Delete every artifact whose `tag_name` equals `tag_value`.
    /// Returns how many artifacts were removed.
    async fn delete_by_tag(&self, tag_name: &str, tag_value: &str) -> Result<usize>;
}

/// No-op hook for deployments without an artifact index.
pub struct NoopCleanup;

#[async_trait]
impl ArtifactCleanup for NoopCleanup {
    async fn delete_by_tag(&self, _tag_name: &str, _tag_value: &str) -> Result<usize> {
        Ok(0)
    }
}
