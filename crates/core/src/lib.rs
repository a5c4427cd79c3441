//! Core types for the replica assistant
//!
//! Closed vocabularies shared by every other crate:
//! - Corpus namespaces and query intents
//! - Retrieval chunks
//! - Provider descriptors
//! - Chat messages

pub mod chunk;
pub mod intent;
pub mod message;
pub mod namespace;
pub mod provider;

pub use chunk::{join_context, RetrievalChunk};
pub use intent::Intent;
pub use message::{Message, Role};
pub use namespace::Namespace;
pub use provider::ProviderDescriptor;

use thiserror::Error;

/// Parse failures for the closed vocabularies in this crate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Unknown intent: {0}")]
    UnknownIntent(String),
}
