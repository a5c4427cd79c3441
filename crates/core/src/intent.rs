//! Query intents

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

/// Coarse category assigned to an incoming query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CareerGuidance,
    AiAdvice,
    CybersecurityAdvice,
    PersonalInfo,
    GeneralRag,
    /// Questions about the asking user rather than the assistant's subject
    UserInfo,
    UserLastQuestion,
    Greeting,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CareerGuidance => "career_guidance",
            Intent::AiAdvice => "ai_advice",
            Intent::CybersecurityAdvice => "cybersecurity_advice",
            Intent::PersonalInfo => "personal_info",
            Intent::GeneralRag => "general_rag",
            Intent::UserInfo => "user_info",
            Intent::UserLastQuestion => "user_last_question",
            Intent::Greeting => "greeting",
            Intent::Unknown => "unknown",
        }
    }

    /// Whether answering this intent benefits from corpus retrieval
    pub fn needs_context(&self) -> bool {
        !matches!(
            self,
            Intent::Greeting | Intent::UserInfo | Intent::UserLastQuestion
        )
    }

    /// Answered from the session's earlier turns instead of the corpus
    pub fn needs_history(&self) -> bool {
        matches!(self, Intent::UserInfo | Intent::UserLastQuestion)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "career_guidance" => Ok(Intent::CareerGuidance),
            "ai_advice" => Ok(Intent::AiAdvice),
            "cybersecurity_advice" => Ok(Intent::CybersecurityAdvice),
            "personal_info" => Ok(Intent::PersonalInfo),
            "general_rag" => Ok(Intent::GeneralRag),
            "user_info" => Ok(Intent::UserInfo),
            "user_last_question" => Ok(Intent::UserLastQuestion),
            "greeting" => Ok(Intent::Greeting),
            "unknown" => Ok(Intent::Unknown),
            other => Err(ParseError::UnknownIntent(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("AI_ADVICE".parse::<Intent>().unwrap(), Intent::AiAdvice);
        assert!("weather".parse::<Intent>().is_err());
    }

    #[test]
    fn test_needs_context() {
        assert!(Intent::CareerGuidance.needs_context());
        assert!(!Intent::Greeting.needs_context());
        assert!(Intent::UserLastQuestion.needs_history());
        assert!(!Intent::UserLastQuestion.needs_context());
        assert!(!Intent::Greeting.needs_history());
    }
}
