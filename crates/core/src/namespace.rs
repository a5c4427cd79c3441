//! Corpus namespaces

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Logical partition of the document corpus.
///
/// The set is closed: every chunk stored in the vector index carries one of
/// these tags, and chunks with an unrecognised tag are treated as `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Projects,
    Background,
    AiMl,
    Cybersecurity,
    Personality,
    Programs,
    /// Default partition for uncategorised documents
    General,
}

impl Namespace {
    pub const ALL: [Namespace; 7] = [
        Namespace::Projects,
        Namespace::Background,
        Namespace::AiMl,
        Namespace::Cybersecurity,
        Namespace::Personality,
        Namespace::Programs,
        Namespace::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Projects => "projects",
            Namespace::Background => "background",
            Namespace::AiMl => "ai_ml",
            Namespace::Cybersecurity => "cybersecurity",
            Namespace::Personality => "personality",
            Namespace::Programs => "programs",
            Namespace::General => "general",
        }
    }

    /// Lenient parse used for payload metadata: unknown tags fall into `General`
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or(Namespace::General)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "projects" | "project" => Ok(Namespace::Projects),
            "background" => Ok(Namespace::Background),
            "ai_ml" | "ai-ml" | "aiml" => Ok(Namespace::AiMl),
            "cybersecurity" | "security" => Ok(Namespace::Cybersecurity),
            "personality" => Ok(Namespace::Personality),
            "programs" | "program" => Ok(Namespace::Programs),
            "general" | "default" | "" => Ok(Namespace::General),
            other => Err(ParseError::UnknownNamespace(other.to_string())),
        }
    }
}
