// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The chat exchange: validate, append, generate, reformat, append.
//!
//! ```text
//! Received ─┬─ empty message ───────────────────────────────▶ Rejected
//!           └─ Validated ─▶ Appended(user) ─▶ Generated ─▶ Reformatted ─▶ Appended(model) ─▶ Responded
//!                                   └────── provider error ──────────────────────────────▶ Failed
//! ```
//!
//! On `Failed` the user turn stays in the transcript (the next request then
//! carries an unanswered user turn as context) unless
//! `history.discard_failed_turns` is set.

use std::sync::Arc;

use chatrelay_config::HistoryConfig;
use chatrelay_model::{ModelProvider, Role, Turn};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    reformat::reformat,
    session::{HistoryPolicy, SessionStore},
};

pub const EMPTY_MESSAGE_REPLY: &str = "⚠️ No message received";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no message received")]
    EmptyInput,

    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
}

impl ChatError {
    /// Text shown to the caller in place of a reply.
    pub fn reply(&self) -> String {
        match self {
            ChatError::EmptyInput => EMPTY_MESSAGE_REPLY.to_string(),
            ChatError::Generation(e) => format!("❌ Error: {e:#}"),
        }
    }
}

pub struct ChatService {
    provider: Arc<dyn ModelProvider>,
    sessions: SessionStore,
    default_session: String,
    policy: HistoryPolicy,
    discard_failed_turns: bool,
}

impl ChatService {
    pub fn new(provider: Arc<dyn ModelProvider>, history: &HistoryConfig) -> Self {
        Self {
            provider,
            sessions: SessionStore::with_max_sessions(history.max_sessions),
            default_session: history.default_session.clone(),
            policy: HistoryPolicy { max_turns: history.max_turns },
            discard_failed_turns: history.discard_failed_turns,
        }
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn default_session(&self) -> &str {
        &self.default_session
    }

    /// Run one exchange and return the reformatted reply.
    ///
    /// `session_id` selects the transcript; `None` or an empty id uses the
    /// default session.
    pub async fn chat(&self, session_id: Option<&str>, message: Option<&str>) -> Result<String, ChatError> {
        let Some(message) = message.filter(|m| !m.is_empty()) else {
            debug!("rejecting empty message");
            return Err(ChatError::EmptyInput);
        };
        let session_id = session_id.filter(|s| !s.is_empty()).unwrap_or(&self.default_session);

        let session = self.sessions.get_or_create(session_id);
        let mut transcript = session.lock().await;

        transcript.append(Role::User, message);
        debug!(session = session_id, turns = transcript.len(), "user turn appended");

        let raw = match self.provider.generate(transcript.turns()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session = session_id, provider = self.provider.name(), "generation failed: {e:#}");
                if self.discard_failed_turns {
                    transcript.pop_if(Role::User);
                }
                transcript.enforce(self.policy);
                return Err(ChatError::Generation(e));
            }
        };
        debug!(session = session_id, raw_len = raw.len(), "reply generated");

        let reply = reformat(&raw);
        transcript.push(Turn::model(reply.clone()));

        let evicted = transcript.enforce(self.policy);
        if evicted > 0 {
            debug!(session = session_id, evicted, "history trimmed");
        }
        info!(session = session_id, turns = transcript.len(), "chat exchange completed");
        Ok(reply)
    }

    /// Copy of a session's history; empty for unknown sessions.
    pub async fn transcript(&self, session_id: Option<&str>) -> Vec<Turn> {
        let session_id = session_id.filter(|s| !s.is_empty()).unwrap_or(&self.default_session);
        match self.sessions.get(session_id) {
            Some(session) => session.lock().await.snapshot(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chatrelay_model::{MockProvider, Scripted, ScriptedMockProvider};

    use super::*;

    fn service(provider: Arc<dyn ModelProvider>) -> ChatService {
        ChatService::new(provider, &HistoryConfig::default())
    }

    fn roles(turns: &[Turn]) -> Vec<Role> {
        turns.iter().map(|t| t.role).collect()
    }

    #[tokio::test]
    async fn reply_is_reformatted_and_stored() {
        let svc = service(Arc::new(ScriptedMockProvider::replies(["1. first\n2. second"])));
        let reply = svc.chat(None, Some("hello")).await.unwrap();
        assert_eq!(reply, "➤ first\n➤ second");

        let history = svc.transcript(None).await;
        assert_eq!(roles(&history), vec![Role::User, Role::Model]);
        assert_eq!(history[0].text(), "hello");
        assert_eq!(history[1].text(), "➤ first\n➤ second");
    }

    #[tokio::test]
    async fn empty_or_missing_message_is_rejected_without_touching_history() {
        let provider = Arc::new(ScriptedMockProvider::replies(["unused"]));
        let svc = service(provider.clone());
        assert!(matches!(svc.chat(None, Some("")).await, Err(ChatError::EmptyInput)));
        assert!(matches!(svc.chat(None, None).await, Err(ChatError::EmptyInput)));
        assert_eq!(provider.call_count(), 0);
        assert!(svc.transcript(None).await.is_empty());
        assert_eq!(ChatError::EmptyInput.reply(), "⚠️ No message received");
    }

    #[tokio::test]
    async fn second_call_sees_prior_exchange_as_context() {
        let provider = Arc::new(ScriptedMockProvider::replies(["one", "two"]));
        let svc = service(provider.clone());
        svc.chat(None, Some("first")).await.unwrap();
        svc.chat(None, Some("second")).await.unwrap();

        let history = svc.transcript(None).await;
        assert_eq!(roles(&history), vec![Role::User, Role::Model, Role::User, Role::Model]);

        let context = provider.request(1).unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[1].text(), "➤ one");
        assert_eq!(context[2].text(), "second");
    }

    #[tokio::test]
    async fn failure_keeps_unanswered_user_turn() {
        let provider = Arc::new(ScriptedMockProvider::new(vec![
            Scripted::Fail("quota exceeded".into()),
            Scripted::Reply("ok".into()),
        ]));
        let svc = service(provider.clone());

        let err = svc.chat(None, Some("first")).await.unwrap_err();
        assert_eq!(err.reply(), "❌ Error: quota exceeded");
        assert_eq!(roles(&svc.transcript(None).await), vec![Role::User]);

        svc.chat(None, Some("retry")).await.unwrap();
        let context = provider.request(1).unwrap();
        assert_eq!(roles(&context), vec![Role::User, Role::User]);
    }

    #[tokio::test]
    async fn failure_can_discard_user_turn() {
        let provider = Arc::new(ScriptedMockProvider::failing("boom"));
        let history = HistoryConfig { discard_failed_turns: true, ..HistoryConfig::default() };
        let svc = ChatService::new(provider, &history);
        assert!(svc.chat(None, Some("first")).await.is_err());
        assert!(svc.transcript(None).await.is_empty());
    }

    #[tokio::test]
    async fn empty_model_output_becomes_fallback() {
        let svc = service(Arc::new(ScriptedMockProvider::replies([""])));
        let reply = svc.chat(None, Some("hi")).await.unwrap();
        assert_eq!(reply, crate::FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn sessions_do_not_share_context() {
        let provider = Arc::new(ScriptedMockProvider::replies(["a", "b"]));
        let svc = service(provider.clone());
        svc.chat(Some("alice"), Some("hi")).await.unwrap();
        svc.chat(Some("bob"), Some("hey")).await.unwrap();

        assert_eq!(provider.request(1).unwrap().len(), 1);
        assert_eq!(svc.transcript(Some("alice")).await.len(), 2);
        assert_eq!(svc.transcript(Some("bob")).await.len(), 2);
        assert!(svc.transcript(None).await.is_empty());
    }

    #[tokio::test]
    async fn empty_session_id_uses_default_session() {
        let svc = service(Arc::new(MockProvider));
        svc.chat(Some(""), Some("hi")).await.unwrap();
        assert_eq!(svc.transcript(Some("default")).await.len(), 2);
    }

    #[tokio::test]
    async fn max_turns_bounds_history() {
        let history = HistoryConfig { max_turns: Some(4), ..HistoryConfig::default() };
        let svc = ChatService::new(Arc::new(MockProvider), &history);
        for n in 0..5 {
            svc.chat(None, Some(&format!("q{n}"))).await.unwrap();
        }
        let turns = svc.transcript(None).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].text(), "q3");
        assert_eq!(turns[3].text(), "➤ MOCK: q4");
    }

    #[tokio::test]
    async fn max_sessions_bounds_session_count() {
        let history = HistoryConfig { max_sessions: Some(3), ..HistoryConfig::default() };
        let svc = ChatService::new(Arc::new(MockProvider), &history);
        for n in 0..10 {
            svc.chat(Some(&format!("caller-{n}")), Some("hi")).await.unwrap();
        }
        assert_eq!(svc.sessions().len(), 3);
        assert_eq!(svc.transcript(Some("caller-9")).await.len(), 2);
        assert!(svc.transcript(Some("caller-0")).await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_on_one_session_stay_alternating() {
        let svc = Arc::new(service(Arc::new(MockProvider)));
        let mut handles = Vec::new();
        for n in 0..16 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.chat(None, Some(&format!("msg {n}"))).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let turns = svc.transcript(None).await;
        assert_eq!(turns.len(), 32);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Model);
            assert_eq!(pair[1].text(), format!("➤ MOCK: {}", pair[0].text()));
        }
    }
}
