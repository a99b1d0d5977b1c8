//! Core types shared across the chat orchestration workspace.
//!
//! This crate owns the wire-level message shapes, the caller identity
//! passed down from the (external) routing layer, and the immutable
//! application settings built once at startup.

pub mod identity;
pub mod message;
pub mod settings;

pub use identity::CallerIdentity;
pub use message::{
    ContentPart, HistoryMetadata, ImageUrl, IncomingMessage, MessageKind, OutboundMessage, Role,
    TurnRequest,
};
pub use settings::{AppSettings, SettingsError};
