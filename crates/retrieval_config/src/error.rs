//! Configuration-build error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or contradictory backend settings. Fatal at startup or at
    /// first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Document-level access control is configured but the caller carried
    /// no access token. Surfaced before any retrieval call is made.
    #[error("authorization error: {0}")]
    Authorization(String),
}
