//! Append-only per-session chat history with bounded, token-budget-aware
//! retrieval.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::message::Message;

#[derive(Clone, Debug)]
pub struct ConversationTurn {
    pub user: Message,
    pub assistant: Message,
    pub file_ids: Vec<String>,
    pub adapters_used: Vec<String>,
    pub seq: u64,
}

/// Estimates how many tokens a window of turns costs against a model's
/// context budget. Kept pluggable since the real cost model is
/// tokenizer-specific; the default is a cheap characters-per-token heuristic.
pub trait TokenBudgetPolicy: Send + Sync {
    fn estimate_tokens(&self, text: &str) -> usize;
}

/// Default estimate: ~4 characters per token, the common rule of thumb for
/// English text with GPT-family tokenizers.
pub struct CharsPerTokenEstimate {
    pub chars_per_token: usize,
}

impl Default for CharsPerTokenEstimate {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenBudgetPolicy for CharsPerTokenEstimate {
    fn estimate_tokens(&self, text: &str) -> usize {
        (text.len() / self.chars_per_token.max(1)).max(1)
    }
}

struct SessionLog {
    turns: Vec<ConversationTurn>,
    next_seq: u64,
}

/// In-process, append-only history store. One process-lifetime instance per
/// deployment; a persistent backend would implement the same shape behind a
/// trait, but the service's ordering/trimming contract lives here regardless
/// of backing store: writes are ordered by arrival time, so concurrent turns
/// on the same session still produce a total order.
pub struct ChatHistoryService {
    sessions: Mutex<HashMap<String, SessionLog>>,
    budget_policy: Box<dyn TokenBudgetPolicy>,
}

impl ChatHistoryService {
    pub fn new(budget_policy: Box<dyn TokenBudgetPolicy>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            budget_policy,
        }
    }

    /// Atomically appends a user+assistant pair. Total order per session is
    /// guaranteed by serializing on the session's own lock.
    pub fn add_conversation_turn(
        &self,
        session_id: &str,
        user: Message,
        assistant: Message,
        file_ids: Vec<String>,
        adapters_used: Vec<String>,
    ) {
        let mut sessions = self.sessions.lock().expect("history mutex poisoned");
        let log = sessions.entry(session_id.to_string()).or_insert_with(|| SessionLog {
            turns: Vec::new(),
            next_seq: 0,
        });
        let seq = log.next_seq;
        log.next_seq += 1;
        log.turns.push(ConversationTurn {
            user,
            assistant,
            file_ids,
            adapters_used,
            seq,
        });
    }

    /// Returns the most recent `limit` turns in chronological order.
    pub fn get_conversation_history(&self, session_id: &str, limit: usize) -> Vec<ConversationTurn> {
        let sessions = self.sessions.lock().expect("history mutex poisoned");
        match sessions.get(session_id) {
            Some(log) => {
                let start = log.turns.len().saturating_sub(limit);
                log.turns[start..].to_vec()
            }
            None => vec![],
        }
    }

    /// Builds the prompt's `history_window`: the most recent turns that fit
    /// `token_budget`, newest-first input but returned oldest-first for
    /// prompt assembly. Never silently discards beyond
    /// the budget; a turn that alone exceeds the budget is still included
    /// once so history is never empty when turns exist.
    pub fn history_window(&self, session_id: &str, token_budget: usize) -> Vec<ConversationTurn> {
        let sessions = self.sessions.lock().expect("history mutex poisoned");
        let Some(log) = sessions.get(session_id) else {
            return vec![];
        };

        let mut window = Vec::new();
        let mut used = 0usize;
        for turn in log.turns.iter().rev() {
            let cost = self.budget_policy.estimate_tokens(turn.user.content())
                + self.budget_policy.estimate_tokens(turn.assistant.content());
            if used + cost > token_budget && !window.is_empty() {
                break;
            }
            used += cost;
            window.push(turn.clone());
            if used >= token_budget {
                break;
            }
        }
        window.reverse();
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> ChatHistoryService {
        ChatHistoryService::new(Box::new(CharsPerTokenEstimate::default()))
    }

    #[test]
    fn turns_are_returned_in_chronological_order() {
        let svc = svc();
        svc.add_conversation_turn(
            "s1",
            Message::User("hi".into()),
            Message::Assistant("hello".into()),
            vec![],
            vec![],
        );
        svc.add_conversation_turn(
            "s1",
            Message::User("bye".into()),
            Message::Assistant("goodbye".into()),
            vec![],
            vec![],
        );
        let history = svc.get_conversation_history("s1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user.content(), "hi");
        assert_eq!(history[1].user.content(), "bye");
    }

    #[test]
    fn get_conversation_history_respects_limit() {
        let svc = svc();
        for i in 0..5 {
            svc.add_conversation_turn(
                "s1",
                Message::User(format!("msg{i}")),
                Message::Assistant("ack".into()),
                vec![],
                vec![],
            );
        }
        let history = svc.get_conversation_history("s1", 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].user.content(), "msg3");
        assert_eq!(history[1].user.content(), "msg4");
    }

    #[test]
    fn unknown_session_returns_empty_history() {
        let svc = svc();
        assert!(svc.get_conversation_history("nope", 10).is_empty());
    }

    #[test]
    fn history_window_always_includes_at_least_one_turn() {
        let svc = svc();
        svc.add_conversation_turn(
            "s1",
            Message::User("x".repeat(500)),
            Message::Assistant("y".repeat(500)),
            vec![],
            vec![],
        );
        let window = svc.history_window("s1", 1);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn history_window_trims_to_budget() {
        let svc = svc();
        for i in 0..10 {
            svc.add_conversation_turn(
                "s1",
                Message::User(format!("turn-{i}")),
                Message::Assistant("ok".into()),
                vec![],
                vec![],
            );
        }
        let window = svc.history_window("s1", 4);
        assert!(window.len() < 10);
        assert!(!window.is_empty());
        // Newest turns win: the last element should be the most recent turn.
        assert_eq!(window.last().unwrap().user.content(), "turn-9");
    }
}
