// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use legion_bus::LegionError;
use tokio::sync::Mutex as AsyncMutex;

use crate::session::{Session, SessionKey, TurnEntry};

/// Per-(agent, conversation) session state and append-only history.
///
/// Each key owns its own `tokio::sync::Mutex`. A caller driving a whole
/// turn takes the cell via `cell`/`lock_owned` and holds the guard for
/// the turn's full duration, which is what actually serializes
/// invocations for the same key; `load`/`apply`/`append_history` only
/// take the lock for a single point mutation and are for callers that
/// don't need turn-length exclusion. The outer `std::sync::Mutex` only
/// guards the registry of per-key locks, never session contents.
pub struct SessionStore {
    locks: std::sync::Mutex<HashMap<SessionKey, Arc<AsyncMutex<Session>>>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            locks: std::sync::Mutex::new(HashMap::new()),
            max_history,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    fn entry(&self, key: &SessionKey) -> Arc<AsyncMutex<Session>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(key.clone()))))
            .clone()
    }

    /// Per-key lock cell, created lazily on first access. Callers that
    /// need to hold the lock across more than one mutation (e.g. an
    /// entire agent turn) should lock this directly rather than going
    /// through `load`/`apply`.
    pub fn cell(&self, key: &SessionKey) -> Arc<AsyncMutex<Session>> {
        self.entry(key)
    }

    /// Load the current snapshot, creating an empty session lazily on
    /// first access.
    pub async fn load(&self, key: &SessionKey) -> Session {
        let cell = self.entry(key);
        let guard = cell.lock().await;
        guard.clone()
    }

    /// Apply a mutation iff `expected_version` matches the session's
    /// current version. On mismatch, returns `ConcurrencyConflict`
    /// without applying anything — the caller reloads and retries once
    ///.
    pub async fn apply<F>(
        &self,
        key: &SessionKey,
        expected_version: u64,
        mutate: F,
    ) -> Result<Session, LegionError>
    where
        F: FnOnce(&mut Session),
    {
        let cell = self.entry(key);
        let mut guard = cell.lock().await;
        if guard.version != expected_version {
            return Err(LegionError::ConcurrencyConflict(format!(
                "{}/{}",
                key.agent_id, key.conversation_id
            )));
        }
        mutate(&mut guard);
        guard.version += 1;
        Ok(guard.clone())
    }

    /// Append turn entries, then drop the oldest until the window is
    /// restored — a convenience wrapper over `apply`.
    pub async fn append_history(
        &self,
        key: &SessionKey,
        expected_version: u64,
        entries: Vec<TurnEntry>,
    ) -> Result<Session, LegionError> {
        let max_history = self.max_history;
        self.apply(key, expected_version, move |session| {
            session.append_history(entries, max_history);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::new("echo", "general")
    }

    #[tokio::test]
    async fn load_creates_session_lazily() {
        let store = SessionStore::new(100);
        let session = store.load(&key()).await;
        assert_eq!(session.version, 0);
    }

    #[tokio::test]
    async fn apply_with_correct_version_succeeds_and_bumps_version() {
        let store = SessionStore::new(100);
        let session = store.load(&key()).await;
        let updated = store
            .apply(&key(), session.version, |s| {
                s.set_state("k", serde_json::json!("v"));
            })
            .await
            .unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.get_state("k"), Some(&serde_json::json!("v")));
    }

    #[tokio::test]
    async fn apply_with_stale_version_returns_concurrency_conflict() {
        let store = SessionStore::new(100);
        let session = store.load(&key()).await;
        store.apply(&key(), session.version, |_| {}).await.unwrap();

        let result = store.apply(&key(), session.version, |_| {}).await;
        assert!(matches!(result, Err(LegionError::ConcurrencyConflict(_))));
    }

    #[tokio::test]
    async fn append_history_windows_to_max_history() {
        let store = SessionStore::new(2);
        let mut version = 0;
        for i in 0..4 {
            let updated = store
                .append_history(&key(), version, vec![TurnEntry::new("user", format!("m{i}"))])
                .await
                .unwrap();
            version = updated.version;
        }
        let session = store.load(&key()).await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history.back().unwrap().parts, "m3");
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let store = SessionStore::new(100);
        let a = SessionKey::new("echo", "general");
        let b = SessionKey::new("alice", "general");
        let sa = store.load(&a).await;
        let sb = store.load(&b).await;
        store.apply(&a, sa.version, |_| {}).await.unwrap();
        store.apply(&b, sb.version, |_| {}).await.unwrap();
    }
}
