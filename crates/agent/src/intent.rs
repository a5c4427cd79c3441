//! Intent detection
//!
//! Keyword rules are checked in order; the first rule with a matching
//! pattern wins. When enabled, the chat model is asked to classify the
//! query first and the rules only run if it fails or replies with
//! something unparseable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use replica_config::constants::chat::INTENT_ATTEMPTS;
use replica_config::ChatConfig;
use replica_core::Intent;
use replica_llm::{with_timeout, ChatModel};

/// Confidence reported for a keyword match
pub const KEYWORD_CONFIDENCE: f32 = 0.8;
/// Confidence reported when nothing matched and the query goes to general RAG
pub const DEFAULT_CONFIDENCE: f32 = 0.6;

/// Detected intent with confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedIntent {
    pub intent: Intent,
    pub confidence: f32,
}

struct IntentRule {
    intent: Intent,
    pattern: Regex,
}

static RULES: Lazy<Vec<IntentRule>> = Lazy::new(|| {
    let rules: [(Intent, &str); 7] = [
        (
            Intent::UserLastQuestion,
            r"\b(last|previous|earlier) (question|message|query)\b|\bwhat did i (just )?ask\b",
        ),
        (
            Intent::UserInfo,
            r"\bwho am i\b|\bmy name\b|\bwhat do you know about me\b",
        ),
        (
            Intent::CareerGuidance,
            r"\b(career|job|work|employment|professional|resume|cv|experience|skills?|development|degree|university|college|education)\b",
        ),
        (
            Intent::AiAdvice,
            r"\b(ai|artificial intelligence|machine learning|ml|deep learning|neural networks?|tensorflow|pytorch|data science|python|programming)\b",
        ),
        (
            Intent::CybersecurityAdvice,
            r"\b(cybersecurity|security|hack\w*|vulnerabilit\w*|threats?|malware|firewalls?|grc|compliance|certifications?|certificates?)\b",
        ),
        (
            Intent::PersonalInfo,
            r"\b(about|background|personal|yourself|who are you|journey|story|github|repos?)\b",
        ),
        (
            Intent::Greeting,
            r"^\s*(hi|hello|hey|good (morning|afternoon|evening))\b",
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(intent, pattern)| match Regex::new(&format!("(?i){}", pattern)) {
            Ok(pattern) => Some(IntentRule { intent, pattern }),
            Err(e) => {
                tracing::error!(intent = %intent, error = %e, "Invalid intent pattern");
                None
            }
        })
        .collect()
});

/// Instruction sent to the chat model when classifying a query
pub fn classification_prompt(query: &str) -> String {
    format!(
        "Classify the query into exactly one category:\n\
         - career_guidance: career advice, job search, professional development\n\
         - ai_advice: AI, machine learning, deep learning\n\
         - cybersecurity_advice: security, hacking, network security\n\
         - personal_info: background, experience, projects\n\
         - general_rag: other questions that need the knowledge base\n\
         - greeting: greetings and introductions\n\
         - user_info: questions about the asking user\n\
         - user_last_question: questions about this conversation\n\n\
         Query: {}\n\n\
         Reply with JSON only: {{\"intent\": \"category\", \"confidence\": 0.85}}",
        query
    )
}

#[derive(Deserialize)]
struct ModelVerdict {
    intent: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse the model's JSON verdict, tolerating text around the object
pub fn parse_model_intent(reply: &str) -> Option<DetectedIntent> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    let verdict: ModelVerdict = serde_json::from_str(&reply[start..=end]).ok()?;
    let intent = verdict.intent.parse::<Intent>().ok()?;
    let confidence = verdict
        .confidence
        .filter(|c| c.is_finite())
        .unwrap_or(KEYWORD_CONFIDENCE)
        .clamp(0.0, 1.0);
    Some(DetectedIntent { intent, confidence })
}

#[derive(Debug, Clone, Copy)]
struct ModelClassification {
    timeout: Duration,
    attempts: u32,
}

/// Intent detector: keyword rules, optionally preceded by the chat model
#[derive(Debug, Default, Clone, Copy)]
pub struct IntentDetector {
    model: Option<ModelClassification>,
}

impl IntentDetector {
    /// Keyword rules only
    pub fn new() -> Self {
        Self { model: None }
    }

    /// Ask the chat model first, each attempt bounded by `timeout`
    pub fn with_model(timeout: Duration, attempts: u32) -> Self {
        Self {
            model: Some(ModelClassification {
                timeout,
                attempts: attempts.max(1),
            }),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        if config.model_intents {
            Self::with_model(Duration::from_secs(config.intent_timeout_secs), INTENT_ATTEMPTS)
        } else {
            Self::new()
        }
    }

    pub fn uses_model(&self) -> bool {
        self.model.is_some()
    }

    /// Keyword classification
    pub fn detect(&self, query: &str) -> DetectedIntent {
        let detected = RULES
            .iter()
            .find(|rule| rule.pattern.is_match(query))
            .map(|rule| DetectedIntent {
                intent: rule.intent,
                confidence: KEYWORD_CONFIDENCE,
            })
            .unwrap_or(DetectedIntent {
                intent: Intent::GeneralRag,
                confidence: DEFAULT_CONFIDENCE,
            });

        tracing::debug!(intent = %detected.intent, confidence = detected.confidence, "Intent detected");
        detected
    }

    /// Model classification with retries, degrading to `detect`
    pub async fn classify(&self, query: &str, model: Option<Arc<dyn ChatModel>>) -> DetectedIntent {
        let (Some(settings), Some(model)) = (self.model, model) else {
            return self.detect(query);
        };

        let prompt = classification_prompt(query);
        for attempt in 1..=settings.attempts {
            match with_timeout(settings.timeout, model.generate(&prompt, "")).await {
                Ok(reply) => match parse_model_intent(&reply) {
                    Some(detected) => {
                        tracing::debug!(
                            intent = %detected.intent,
                            confidence = detected.confidence,
                            model = %model.model_name(),
                            "Intent classified by model"
                        );
                        return detected;
                    }
                    None => {
                        tracing::debug!(model = %model.model_name(), "Unparseable intent reply");
                        break;
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Intent classification failed");
                }
            }
        }

        self.detect(query)
    }
}
