// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key identifying a session: `conversation_id` is a deterministic
/// function of channel (the channel id itself for public rooms, the dm
/// pair for direct messages — computed by the caller, `legion-channels`
/// in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub agent_id: String,
    pub conversation_id: String,
}

impl SessionKey {
    pub fn new(agent_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// One entry in a session's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEntry {
    pub role: String,
    pub parts: String,
    pub timestamp: DateTime<Utc>,
}

impl TurnEntry {
    pub fn new(role: impl Into<String>, parts: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: parts.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Per-(agent, conversation) mutable state bag plus windowed history.
/// `version` backs optimistic concurrency in `SessionStore::apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    pub state: HashMap<String, serde_json::Value>,
    pub history: VecDeque<TurnEntry>,
    /// Set by the Memory Engine; not cleared by windowing.
    pub summary: Option<String>,
    pub version: u64,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            state: HashMap::new(),
            history: VecDeque::new(),
            summary: None,
            version: 0,
        }
    }

    pub fn set_state(&mut self, k: impl Into<String>, v: serde_json::Value) {
        self.state.insert(k.into(), v);
    }

    pub fn get_state(&self, k: &str) -> Option<&serde_json::Value> {
        self.state.get(k)
    }

    /// Append entries and drop the oldest until `history.len() <= max_history`.
    pub fn append_history(&mut self, entries: impl IntoIterator<Item = TurnEntry>, max_history: usize) {
        self.history.extend(entries);
        while self.history.len() > max_history {
            self.history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::new("echo", "general")
    }

    // ── Construction ──────────────────────────────────────────────────────────

    #[test]
    fn new_session_starts_at_version_zero() {
        let s = Session::new(key());
        assert_eq!(s.version, 0);
        assert!(s.history.is_empty());
    }

    #[test]
    fn session_key_equality_is_by_value() {
        assert_eq!(SessionKey::new("a", "b"), SessionKey::new("a", "b"));
        assert_ne!(SessionKey::new("a", "b"), SessionKey::new("a", "c"));
    }

    // ── State map ─────────────────────────────────────────────────────────────

    #[test]
    fn set_and_get_state_round_trips() {
        let mut s = Session::new(key());
        s.set_state("emotional_cue", serde_json::json!("calm and curious"));
        assert_eq!(
            s.get_state("emotional_cue"),
            Some(&serde_json::json!("calm and curious"))
        );
    }

    #[test]
    fn get_state_missing_key_is_none() {
        let s = Session::new(key());
        assert!(s.get_state("missing").is_none());
    }

    // ── Windowed history ──────────────────────────────────────────────────────

    #[test]
    fn append_history_within_window_keeps_all_entries() {
        let mut s = Session::new(key());
        s.append_history(
            vec![TurnEntry::new("user", "hi"), TurnEntry::new("agent", "hello")],
            10,
        );
        assert_eq!(s.history.len(), 2);
    }

    #[test]
    fn append_history_drops_oldest_beyond_max() {
        let mut s = Session::new(key());
        for i in 0..5 {
            s.append_history(vec![TurnEntry::new("user", format!("msg{i}"))], 3);
        }
        assert_eq!(s.history.len(), 3);
        assert_eq!(s.history.front().unwrap().parts, "msg2");
        assert_eq!(s.history.back().unwrap().parts, "msg4");
    }

    #[test]
    fn summary_survives_windowing() {
        let mut s = Session::new(key());
        s.summary = Some("earlier context summarized".into());
        s.append_history(vec![TurnEntry::new("user", "x")], 1);
        s.append_history(vec![TurnEntry::new("user", "y")], 1);
        assert_eq!(s.summary.as_deref(), Some("earlier context summarized"));
    }
}
