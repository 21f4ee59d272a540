// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-memory conversation history.
//!
//! A [`Transcript`] is the ordered, append-only list of turns sent to the
//! model as context.  [`SessionStore`] keys transcripts by a caller-supplied
//! session id.  Nothing is persisted; history lives as long as the process.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chatrelay_model::{Role, Turn};

/// Shared handle to one session's transcript.
///
/// The async lock is held for a whole exchange (user append through model
/// append), which keeps turns of concurrent requests on the same session
/// from interleaving.
pub type SessionHandle = Arc<tokio::sync::Mutex<Transcript>>;

/// Eviction rule applied after every exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Keep at most this many turns; `None` keeps everything.
    pub max_turns: Option<usize>,
}

impl HistoryPolicy {
    pub fn unbounded() -> Self {
        Self { max_turns: None }
    }

    pub fn capped(max_turns: usize) -> Self {
        Self { max_turns: Some(max_turns) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single-part turn.  Role alternation is not checked.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Owned copy of the full ordered history.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Remove the newest turn if it has `role`.
    pub fn pop_if(&mut self, role: Role) -> Option<Turn> {
        if self.last().is_some_and(|t| t.role == role) {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Evict the oldest turns so that `policy` holds, then keep dropping
    /// until the history starts with a user turn.  Returns the number of
    /// turns removed.
    pub fn enforce(&mut self, policy: HistoryPolicy) -> usize {
        let Some(max) = policy.max_turns else {
            return 0;
        };
        let mut cut = self.turns.len().saturating_sub(max);
        if cut == 0 {
            return 0;
        }
        while cut < self.turns.len() && self.turns[cut].role != Role::User {
            cut += 1;
        }
        self.turns.drain(..cut);
        cut
    }
}

/// Process-wide map of session id → transcript, optionally capped in size.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    max_sessions: Option<usize>,
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, Entry>,
    /// Logical clock bumped on every lookup; orders entries by recency.
    clock: u64,
}

#[derive(Debug)]
struct Entry {
    handle: SessionHandle,
    last_used: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding at most `max_sessions` sessions (`None` = unbounded).
    /// Creating a session in a full store drops the least recently used one.
    pub fn with_max_sessions(max_sessions: Option<usize>) -> Self {
        Self { sessions: Mutex::default(), max_sessions }
    }

    /// Return the transcript for `session_id`, creating an empty one on first use.
    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let sessions = &mut *guard;
        sessions.clock += 1;
        let now = sessions.clock;

        if let Some(entry) = sessions.entries.get_mut(session_id) {
            entry.last_used = now;
            return entry.handle.clone();
        }

        if let Some(max) = self.max_sessions {
            while sessions.entries.len() >= max.max(1) {
                let Some(oldest) = sessions
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                sessions.entries.remove(&oldest);
                tracing::debug!(session = %oldest, max, "evicting least recently used session");
            }
        }

        tracing::debug!(session = session_id, "creating session");
        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(Transcript::new()));
        sessions
            .entries
            .insert(session_id.to_string(), Entry { handle: handle.clone(), last_used: now });
        handle
    }

    /// Look up an existing session without creating it or touching its recency.
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(session_id)
            .map(|e| e.handle.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known session ids, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
