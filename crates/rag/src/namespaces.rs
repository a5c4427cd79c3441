//! Namespace priority tables

use replica_core::{Intent, Namespace};

/// Preferred namespaces for an intent, most relevant first
pub fn priority_for(intent: Intent) -> &'static [Namespace] {
    use Namespace::*;
    match intent {
        Intent::CareerGuidance => &[Background, Programs, Projects],
        Intent::AiAdvice => &[AiMl, Projects, Background],
        Intent::CybersecurityAdvice => &[Cybersecurity, Programs, Background],
        Intent::PersonalInfo => &[Background, Personality, Projects, Programs],
        Intent::GeneralRag => &[Projects, AiMl, Cybersecurity, Background, Programs, Personality],
        _ => &[Background, Projects],
    }
}

/// Tie-break rank for equal scores across namespaces (lower wins).
/// Specific project detail outranks generic background.
pub fn tie_break_rank(namespace: Namespace) -> u8 {
    match namespace {
        Namespace::Projects => 0,
        Namespace::AiMl => 1,
        Namespace::Cybersecurity => 2,
        Namespace::Programs => 3,
        Namespace::Background => 4,
        Namespace::Personality => 5,
        Namespace::General => 6,
    }
}
