//! Per-conversation turn history
//!
//! Backs the intents that ask about the conversation itself. Each
//! conversation keeps its most recent turns; idle conversations expire
//! with the response cache TTL.

use moka::future::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use replica_config::ChatConfig;

/// Conversation identity: user and session, either may be absent
pub fn history_key(user_id: Option<&str>, session_id: Option<&str>) -> String {
    format!(
        "history:{}:{}",
        user_id.unwrap_or_default(),
        session_id.unwrap_or_default()
    )
}

/// One answered exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub query: String,
    pub response: String,
}

/// History as prompt context, oldest first
pub fn render(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("User: {}\nAssistant: {}", t.query, t.response))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ConversationHistory {
    conversations: Cache<String, Arc<Mutex<VecDeque<Turn>>>>,
    max_turns: usize,
}

impl ConversationHistory {
    pub fn new(max_turns: usize, capacity: u64, ttl: Duration) -> Self {
        let conversations = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(ttl)
            .build();
        Self {
            conversations,
            max_turns,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            config.history_turns,
            config.history_capacity,
            Duration::from_secs(config.cache_ttl_secs),
        )
    }

    pub async fn record(&self, key: &str, query: &str, response: &str) {
        if self.max_turns == 0 {
            return;
        }
        let turns = self
            .conversations
            .get_with_by_ref(key, async { Arc::new(Mutex::new(VecDeque::new())) })
            .await;

        let mut turns = turns.lock();
        turns.push_back(Turn {
            query: query.to_string(),
            response: response.to_string(),
        });
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Earlier turns, oldest first
    pub async fn turns(&self, key: &str) -> Vec<Turn> {
        match self.conversations.get(key).await {
            Some(turns) => turns.lock().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn last_question(&self, key: &str) -> Option<String> {
        let turns = self.conversations.get(key).await?;
        let last = turns.lock().back().map(|t| t.query.clone());
        last
    }

    pub async fn clear(&self, key: &str) {
        self.conversations.invalidate(key).await;
    }
}

impl std::fmt::Debug for ConversationHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHistory")
            .field("conversations", &self.conversations.entry_count())
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(max_turns: usize) -> ConversationHistory {
        ConversationHistory::new(max_turns, 100, Duration::from_secs(60))
    }

    #[test]
    fn test_history_key() {
        assert_eq!(history_key(Some("u1"), Some("s1")), "history:u1:s1");
        assert_eq!(history_key(None, Some("s1")), "history::s1");
        assert_ne!(history_key(Some("u1"), Some("s1")), history_key(Some("u1"), Some("s2")));
    }

    #[tokio::test]
    async fn test_keeps_most_recent_turns() {
        let history = history(2);
        for i in 1..=3 {
            history.record("k", &format!("q{i}"), &format!("a{i}")).await;
        }

        let turns = history.turns("k").await;
        let queries: Vec<&str> = turns.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, vec!["q2", "q3"]);
        assert_eq!(history.last_question("k").await.as_deref(), Some("q3"));
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let history = history(5);
        history.record("a", "first", "reply").await;

        assert!(history.turns("b").await.is_empty());
        assert!(history.last_question("b").await.is_none());

        history.clear("a").await;
        assert!(history.turns("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_turns_records_nothing() {
        let history = history(0);
        history.record("k", "q", "a").await;
        assert!(history.turns("k").await.is_empty());
    }

    #[test]
    fn test_render_is_oldest_first() {
        let turns = vec![
            Turn { query: "one".into(), response: "1".into() },
            Turn { query: "two".into(), response: "2".into() },
        ];
        assert_eq!(render(&turns), "User: one\nAssistant: 1\nUser: two\nAssistant: 2");
    }
}
