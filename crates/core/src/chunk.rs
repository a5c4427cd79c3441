//! Retrieved context chunks

use serde::{Deserialize, Serialize};

use crate::Namespace;

/// One context snippet produced by retrieval. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalChunk {
    pub text: String,
    pub namespace: Namespace,
    pub score: f32,
    pub source: String,
}

impl RetrievalChunk {
    pub fn new(
        text: impl Into<String>,
        namespace: Namespace,
        score: f32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            namespace,
            score,
            source: source.into(),
        }
    }
}

/// Join chunk texts into a single context block for generation
pub fn join_context(chunks: &[RetrievalChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_context() {
        let chunks = vec![
            RetrievalChunk::new("first", Namespace::Projects, 0.9, "a"),
            RetrievalChunk::new("second", Namespace::Background, 0.8, "b"),
        ];
        assert_eq!(join_context(&chunks), "first\n\nsecond");
        assert_eq!(join_context(&[]), "");
    }
}
