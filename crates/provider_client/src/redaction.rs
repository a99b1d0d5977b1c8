//! Secret redaction for diagnostics.
//!
//! A redacted copy of the invocation args is the only form that may ever
//! be logged. Redaction is a pure function over the typed request: it
//! recurses through the documented secret-bearing paths (backend
//! authentication, embedding-dependency authentication) and returns a new
//! value, leaving the original untouched. The real values are only ever
//! used in outbound calls.

use crate::api::models::ModelInvocationArgs;
use retrieval_config::{Authentication, EmbeddingDependency};

/// The fixed mask substituted for every credential.
pub const SECRET_MASK: &str = "*****";

/// Every field name that carries a credential anywhere in the invocation
/// request. Kept as one shared constant so tests can assert exhaustively
/// against the serialized form.
pub const SECRET_FIELDS: &[&str] = &[
    "key",
    "api_key",
    "connection_string",
    "encoded_api_key",
    "embedding_key",
];

fn redact_authentication(authentication: &mut Authentication) {
    match authentication {
        Authentication::ApiKey { api_key } => *api_key = SECRET_MASK.to_string(),
        Authentication::Key { key } => *key = SECRET_MASK.to_string(),
        Authentication::ConnectionString { connection_string } => {
            *connection_string = SECRET_MASK.to_string()
        }
        Authentication::EncodedApiKey { encoded_api_key } => {
            *encoded_api_key = SECRET_MASK.to_string()
        }
        Authentication::ServiceIdentity {} => {}
    }
}

/// Produce a deep copy of the args with every credential replaced by
/// [`SECRET_MASK`]. Idempotent; the input is not mutated.
pub fn redact_invocation_args(args: &ModelInvocationArgs) -> ModelInvocationArgs {
    let mut clean = args.clone();
    if let Some(sources) = clean.data_sources.as_mut() {
        for source in sources {
            if let Some(authentication) = source.authentication_mut() {
                redact_authentication(authentication);
            }
            if let Some(EmbeddingDependency::Endpoint { authentication, .. }) =
                source.embedding_dependency_mut()
            {
                redact_authentication(authentication);
            }
        }
    }
    clean
}
