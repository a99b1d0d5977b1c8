//! Provider error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport failure before a status was received (connect, timeout,
    /// dropped stream).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered 2xx but the body did not parse.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The client cannot be constructed from the current settings.
    #[error("provider is not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// The status code to surface at the turn boundary. The provider's
    /// own status is forwarded when there is one.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Status { status, .. } => *status,
            _ => 500,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<reqwest_middleware::Error> for ProviderError {
    fn from(err: reqwest_middleware::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Malformed(err.to_string())
    }
}
