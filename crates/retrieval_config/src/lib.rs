//! Retrieval backend configuration.
//!
//! Turns the uniform inputs of a turn (settings, caller identity,
//! conversation id) into the backend-specific retrieval extension that is
//! attached to a model invocation. Backends are a closed sum type; adding
//! a backend without a corresponding variant fails to compile at the
//! exhaustive match in the builder.

pub mod builder;
pub mod error;
pub mod filter;
pub mod source;

pub use builder::{BackendKind, DataSourceBuilder};
pub use error::BuildError;
pub use source::{
    Authentication, DataSource, EmbeddingDependency, FieldsMapping, QueryType,
};
