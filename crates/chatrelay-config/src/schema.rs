// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "google" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override, e.g. for a local proxy.
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Optional system instruction sent ahead of the conversation.
    pub system_instruction: Option<String>,
    /// Per-attempt timeout for the generation call, in seconds.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures (timeouts,
    /// connection errors, HTTP 429 / 5xx).  `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further attempt.
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "google".into(),
            name: "gemini-1.5-flash".into(),
            api_key_env: Some("GEMINI_API_KEY".into()),
            api_key: None,
            base_url: None,
            max_tokens: None,
            temperature: None,
            system_instruction: None,
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_ui_path() -> PathBuf {
    PathBuf::from("chat.html")
}

fn default_max_body() -> usize {
    1024 * 1024
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTML page served on `GET /`.  A built-in page is served when the file
    /// cannot be read.
    #[serde(default = "default_ui_path")]
    pub ui_path: PathBuf,

    /// Maximum request body size in bytes (default: 1 MiB).
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            ui_path: default_ui_path(),
            max_body_bytes: default_max_body(),
        }
    }
}

fn default_session() -> String {
    "default".to_string()
}

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Session used for requests that carry no `session_id`.
    #[serde(default = "default_session")]
    pub default_session: String,

    /// Upper bound on stored turns per session.  Oldest turns are evicted
    /// first.  Unset means unbounded.  Must be at least 2 (one exchange).
    #[serde(default)]
    pub max_turns: Option<usize>,

    /// Upper bound on the number of sessions kept in memory.  Session ids
    /// are chosen by callers, so without a cap every new id adds a
    /// transcript for the life of the process.  When full, the least
    /// recently used session is dropped.  Unset means unbounded.
    #[serde(default)]
    pub max_sessions: Option<usize>,

    /// Remove the user turn again when generation fails.  Off by default:
    /// the unanswered turn stays in the transcript and is sent as context
    /// with the next request.
    #[serde(default)]
    pub discard_failed_turns: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_session: default_session(),
            max_turns: None,
            max_sessions: None,
            discard_failed_turns: false,
        }
    }
}

const REDACTED: &str = "********";

impl Config {
    /// Reject settings that parse but cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(n) = self.history.max_turns {
            anyhow::ensure!(
                n >= 2,
                "history.max_turns = {n} would drop the exchange that just finished; use at least 2 or leave it unset"
            );
        }
        if let Some(n) = self.history.max_sessions {
            anyhow::ensure!(n >= 1, "history.max_sessions must be at least 1");
        }
        Ok(())
    }

    /// Copy suitable for printing: secrets are masked.
    pub fn redacted(&self) -> Config {
        let mut cfg = self.clone();
        if cfg.model.api_key.is_some() {
            cfg.model.api_key = Some(REDACTED.to_string());
        }
        cfg
    }
}
