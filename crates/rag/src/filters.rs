//! Metadata filter derivation for the primary retrieval strategy

use once_cell::sync::Lazy;
use regex::Regex;

use replica_core::{Intent, Namespace};

use crate::namespaces::priority_for;

/// Any-of match on the chunk's namespace tag
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataFilter {
    pub namespaces: Vec<Namespace>,
}

impl MetadataFilter {
    pub fn new(namespaces: Vec<Namespace>) -> Self {
        Self { namespaces }
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn tags(&self) -> Vec<String> {
        self.namespaces.iter().map(|n| n.as_str().to_string()).collect()
    }
}

static KEYWORD_RULES: Lazy<Vec<(Regex, Namespace)>> = Lazy::new(|| {
    let rules: [(&str, Namespace); 6] = [
        (r"\b(projects?|built|build|app|application|portfolio|github)\b", Namespace::Projects),
        (r"\b(courses?|certificat\w*|programs?|degree|bootcamp)\b", Namespace::Programs),
        (r"\b(security|cyber\w*|pentest\w*|hacking|ctf|vulnerab\w*)\b", Namespace::Cybersecurity),
        (r"\b(ai|ml|machine learning|deep learning|llms?|neural|models?)\b", Namespace::AiMl),
        (r"\b(personality|hobb\w*|strengths?|weakness\w*|values|interests?)\b", Namespace::Personality),
        (r"\b(background|education|experience|career|work\w*|job|studied|university)\b", Namespace::Background),
    ];
    rules
        .into_iter()
        .filter_map(|(pattern, ns)| Regex::new(&format!("(?i){}", pattern)).ok().map(|re| (re, ns)))
        .collect()
});

/// Namespaces mentioned by the query, falling back to the intent's
/// priority list when no keyword matches
pub fn derive_filter(query: &str, intent: Intent) -> MetadataFilter {
    let mut namespaces: Vec<Namespace> = KEYWORD_RULES
        .iter()
        .filter(|(re, _)| re.is_match(query))
        .map(|(_, ns)| *ns)
        .collect();

    if namespaces.is_empty() {
        namespaces = priority_for(intent).to_vec();
    }

    MetadataFilter::new(namespaces)
}

/// Instruction sent to a chat model when model-proposed filters are enabled
pub fn filter_instruction(query: &str) -> String {
    let tags: Vec<&str> = Namespace::ALL
        .iter()
        .filter(|n| **n != Namespace::General)
        .map(|n| n.as_str())
        .collect();
    format!(
        "Classify the question into exactly one category from [{}]. \
         Reply with the category name only, or \"none\".\n\nQuestion: {}",
        tags.join(", "),
        query
    )
}

/// First known namespace named in a model reply; `General` never counts
pub fn parse_model_filter(reply: &str) -> Option<MetadataFilter> {
    reply
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            word.parse::<Namespace>()
                .ok()
                .filter(|ns| *ns != Namespace::General)
        })
        .map(|ns| MetadataFilter::new(vec![ns]))
}
