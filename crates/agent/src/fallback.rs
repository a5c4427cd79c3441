//! Canned replies used when no model can generate

use replica_core::Intent;

use crate::history::Turn;

pub fn canned_response(intent: Intent) -> &'static str {
    match intent {
        Intent::CareerGuidance => {
            "I can talk about my career path across AI engineering and cybersecurity. \
             Which part would you like to hear about?"
        }
        Intent::AiAdvice => {
            "I work on AI and machine learning projects. \
             What would you like to know about that work?"
        }
        Intent::CybersecurityAdvice => {
            "I have hands-on experience with penetration testing, security analysis \
             and security tooling. Which topic interests you?"
        }
        Intent::PersonalInfo => {
            "I'm an AI engineer and cybersecurity analyst. \
             Ask me about my background or projects."
        }
        Intent::Greeting => {
            "Hello! Ask me anything about my experience, projects or interests."
        }
        Intent::GeneralRag => {
            "I can share details about my projects, background and expertise. \
             What specific information are you looking for?"
        }
        Intent::UserInfo | Intent::UserLastQuestion | Intent::Unknown => {
            "I'm having trouble answering right now. Please try again in a moment."
        }
    }
}

/// Canned reply for `intent`; history questions are answered from the
/// conversation's turns when there are any
pub fn fallback_reply(intent: Intent, turns: &[Turn]) -> String {
    match (intent, turns.last()) {
        (Intent::UserLastQuestion, Some(last)) => {
            format!("Your last question was: \"{}\"", last.query)
        }
        (Intent::UserLastQuestion, None) | (Intent::UserInfo, None) => {
            "I don't have that specific information.".to_string()
        }
        _ => canned_response(intent).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_fallbacks() {
        let turns = vec![Turn {
            query: "Where did you study?".to_string(),
            response: "At a university.".to_string(),
        }];
        assert_eq!(
            fallback_reply(Intent::UserLastQuestion, &turns),
            "Your last question was: \"Where did you study?\""
        );
        assert_eq!(
            fallback_reply(Intent::UserLastQuestion, &[]),
            "I don't have that specific information."
        );
        assert_eq!(
            fallback_reply(Intent::AiAdvice, &turns),
            canned_response(Intent::AiAdvice)
        );
    }

    #[test]
    fn test_every_intent_has_a_reply() {
        for intent in [
            Intent::CareerGuidance,
            Intent::AiAdvice,
            Intent::CybersecurityAdvice,
            Intent::PersonalInfo,
            Intent::GeneralRag,
            Intent::UserInfo,
            Intent::UserLastQuestion,
            Intent::Greeting,
            Intent::Unknown,
        ] {
            assert!(!canned_response(intent).is_empty());
        }
        assert!(canned_response(Intent::Greeting).starts_with("Hello"));
    }
}
