//! Provider identity

use serde::{Deserialize, Serialize};

/// Static description of one model backend. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub name: String,
    pub supports_chat: bool,
    pub supports_embeddings: bool,
}
