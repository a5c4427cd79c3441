//! Prompt assembly for generation calls
//!
//! The system prompt is the persona, a focus line chosen by intent, and
//! then either the retrieved context or the session's earlier turns.

use replica_core::{Intent, Message, Role};

const NO_CONTEXT_NOTE: &str = "No relevant documents were found for this question. \
     Say that the information may be unavailable rather than guessing.";

const NO_HISTORY_NOTE: &str = "There are no earlier messages in this conversation. \
     Reply that you don't have that specific information.";

/// Focus line for each intent's template
pub fn focus(intent: Intent) -> &'static str {
    match intent {
        Intent::CareerGuidance => {
            "Focus on career path, education and professional experience, and give \
             practical guidance drawn from it."
        }
        Intent::AiAdvice => {
            "Focus on AI and machine learning work: models, tools and projects. \
             Keep technical claims tied to the context."
        }
        Intent::CybersecurityAdvice => {
            "Focus on security experience: certifications, compliance and defensive \
             work. Do not give operational attack instructions."
        }
        Intent::PersonalInfo => {
            "Focus on background, personality and personal projects. Speak warmly \
             and in the first person."
        }
        Intent::GeneralRag => "Answer the question directly from the context.",
        Intent::Greeting => "Greet the user briefly and offer to answer questions.",
        Intent::UserInfo => {
            "The user is asking about themselves. Use only what they said earlier \
             in this conversation."
        }
        Intent::UserLastQuestion => {
            "The user is asking about the conversation itself. When asked for their \
             last question, reply with the most recent user message from the history."
        }
        Intent::Unknown => "Answer helpfully and concisely.",
    }
}

/// System prompt for `intent` carrying the persona and the context
pub fn system_prompt(persona: &str, intent: Intent, context: &str) -> String {
    let head = format!("{}\n\n{}", persona, focus(intent));
    let empty = context.trim().is_empty();

    match (intent.needs_history(), empty) {
        (true, true) => format!("{}\n\n{}", head, NO_HISTORY_NOTE),
        (true, false) => format!(
            "{}\n\nConversation history (most recent last):\n{}",
            head, context
        ),
        (false, true) => format!("{}\n\n{}", head, NO_CONTEXT_NOTE),
        (false, false) => format!(
            "{}\n\nAnswer using only the context below.\n\nContext:\n{}",
            head, context
        ),
    }
}

/// Chat messages for backends with a chat-completions API
pub fn build_messages(persona: &str, intent: Intent, query: &str, context: &str) -> Vec<Message> {
    vec![
        Message::system(system_prompt(persona, intent, context)),
        Message::user(query),
    ]
}

/// Single-string prompt for text-generation APIs
pub fn flatten(messages: &[Message]) -> String {
    let mut prompt = String::new();
    for message in messages {
        let label = match message.role {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&message.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Assistant:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_mentions_unavailable() {
        let prompt = system_prompt("persona", Intent::GeneralRag, "  ");
        assert!(prompt.contains("may be unavailable"));
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn test_context_is_embedded() {
        let messages = build_messages("persona", Intent::GeneralRag, "What do you build?", "Built a compiler.");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("Built a compiler."));
        assert_eq!(messages[1].content, "What do you build?");
    }

    #[test]
    fn test_career_template() {
        let prompt = system_prompt("persona", Intent::CareerGuidance, "Studied CS.");
        assert!(prompt.starts_with("persona"));
        assert!(prompt.contains("career path"));
        assert!(prompt.contains("Studied CS."));
    }

    #[test]
    fn test_ai_template() {
        let prompt = system_prompt("persona", Intent::AiAdvice, "Trained a classifier.");
        assert!(prompt.contains("machine learning"));
        assert!(!prompt.contains("career path"));
    }

    #[test]
    fn test_cybersecurity_template() {
        let prompt = system_prompt("persona", Intent::CybersecurityAdvice, "Holds Security+.");
        assert!(prompt.contains("certifications"));
        assert!(prompt.contains("Holds Security+."));
    }

    #[test]
    fn test_personal_template() {
        let prompt = system_prompt("persona", Intent::PersonalInfo, "Likes hiking.");
        assert!(prompt.contains("personality"));
    }

    #[test]
    fn test_general_and_fallback_templates() {
        let rag = system_prompt("persona", Intent::GeneralRag, "c");
        let unknown = system_prompt("persona", Intent::Unknown, "c");
        let greeting = system_prompt("persona", Intent::Greeting, "");
        assert!(rag.contains("directly from the context"));
        assert!(unknown.contains("helpfully"));
        assert!(greeting.contains("Greet"));
        assert_ne!(rag, unknown);
    }

    #[test]
    fn test_history_templates() {
        let history = "User: Where did you study?\nAssistant: At a university.";
        let prompt = system_prompt("persona", Intent::UserLastQuestion, history);
        assert!(prompt.contains("Conversation history"));
        assert!(prompt.contains("Where did you study?"));
        assert!(!prompt.contains("Context:"));

        let empty = system_prompt("persona", Intent::UserInfo, "");
        assert!(empty.contains("don't have that specific information"));
    }

    #[test]
    fn test_flatten_ends_with_assistant_turn() {
        let flat = flatten(&build_messages("p", Intent::GeneralRag, "q", "c"));
        assert!(flat.starts_with("System: p"));
        assert!(flat.ends_with("Assistant:"));
    }
}
