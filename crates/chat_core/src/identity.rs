//! Caller identity as resolved by the (external) routing layer.
//!
//! The core never inspects request headers itself; whatever extracted the
//! identity hands this struct down.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Stable principal id of the caller. History operations are scoped
    /// to this id.
    pub user_id: String,
    /// Bearer token forwarded from the client, required when
    /// document-level access filtering is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Group memberships of the caller, used to build the access filter.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
            groups: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }
}
