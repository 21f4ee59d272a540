// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::{Role, Turn};

/// Deterministic mock provider for offline runs.  Echoes the last user turn
/// back as the model reply.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn generate(&self, transcript: &[Turn]) -> anyhow::Result<String> {
        let reply = transcript
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(Turn::text)
            .unwrap_or_else(|| "[no input]".to_string());
        Ok(format!("MOCK: {reply}"))
    }
}

/// One scripted outcome of [`ScriptedMockProvider::generate`].
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
}

/// A pre-scripted mock provider.  Each call to `generate` pops the next
/// outcome from the front of the queue and records the transcript it was
/// given, so tests can inspect exactly what context reached the model.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Scripted>>>,
    /// Every transcript seen by this provider, in call order.
    pub requests: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Scripted>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience: provider that returns the given replies in order.
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Scripted::Reply(r.into())).collect())
    }

    /// Convenience: provider whose first call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![Scripted::Fail(message.into())])
    }

    /// Number of `generate` calls seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Transcript passed to the `n`th call (0-based).
    pub fn request(&self, n: usize) -> Option<Vec<Turn>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).get(n).cloned()
    }
}

#[async_trait]
impl crate::ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn generate(&self, transcript: &[Turn]) -> anyhow::Result<String> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(transcript.to_vec());
        let next = {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            if scripts.is_empty() {
                // Default fallback when all scripts are consumed
                Scripted::Reply("[no more scripts]".into())
            } else {
                scripts.remove(0)
            }
        };
        match next {
            Scripted::Reply(text) => Ok(text),
            Scripted::Fail(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
