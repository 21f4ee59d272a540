// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Google Gemini driver — native Generative Language API.
//!
//! Uses the non-streaming `generateContent` endpoint: the relay returns one
//! reformatted reply per request, so there is nothing to gain from SSE.
//!
//! # Auth
//! API key via the `x-goog-api-key` header.
//!
//! # Endpoint pattern
//! `POST https://generativelanguage.googleapis.com/v1beta/models/{model}:generateContent`

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    retry::{with_retry, AttemptError, RetryPolicy},
    Turn,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GoogleProvider {
    model: String,
    api_key: Option<String>,
    base_url: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    system_instruction: Option<String>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            max_tokens,
            temperature,
            system_instruction: None,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(&self, transcript: &[Turn]) -> Value {
        let contents: Vec<Value> = transcript.iter().map(turn_to_gemini_content).collect();

        let mut body = json!({ "contents": contents });

        // Unset knobs are left to the model's own defaults.
        let mut generation_config = serde_json::Map::new();
        if let Some(max_tokens) = self.max_tokens {
            generation_config.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = self.temperature {
            generation_config.insert("temperature".into(), json!(temperature));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        if let Some(instruction) = &self.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        body
    }

    async fn send_once(&self, url: &str, key: &str, body: &Value) -> Result<String, AttemptError> {
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let builder = e.is_builder();
                let e = anyhow::Error::new(e).context("Google Gemini request failed");
                if builder { AttemptError::Fatal(e) } else { AttemptError::Transient(e) }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AttemptError::Transient(anyhow::Error::new(e).context("reading Gemini response")))?;

        if !status.is_success() {
            let err = anyhow!("Google Gemini error {status}: {}", api_error_message(&text));
            return Err(if is_transient_status(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let v: Value = serde_json::from_str(&text)
            .context("Gemini response is not valid JSON")
            .map_err(AttemptError::Fatal)?;
        parse_generate_response(&v).map_err(AttemptError::Fatal)
    }
}

#[async_trait]
impl crate::ModelProvider for GoogleProvider {
    fn name(&self) -> &str { "google" }
    fn model_name(&self) -> &str { &self.model }

    async fn generate(&self, transcript: &[Turn]) -> anyhow::Result<String> {
        let key = self.api_key.as_deref().context("GEMINI_API_KEY not set")?;
        let url = self.endpoint();
        let body = self.request_body(transcript);

        debug!(model = %self.model, turns = transcript.len(), "sending Google Gemini request");

        with_retry(&self.retry, "Gemini request", || self.send_once(&url, key, &body)).await
    }
}

fn turn_to_gemini_content(turn: &Turn) -> Value {
    let parts: Vec<Value> = turn.parts.iter().map(|p| json!({ "text": p })).collect();
    json!({ "role": turn.role.as_str(), "parts": parts })
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Prefer `error.message` from a Google API error body; fall back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Extract the reply text from a `generateContent` response.
///
/// Text parts of the first candidate are concatenated; `thought` parts are
/// skipped.  A candidate without text yields an empty string.  A response
/// with no candidates and a `promptFeedback.blockReason` is an error.
fn parse_generate_response(v: &Value) -> anyhow::Result<String> {
    let Some(candidate) = v["candidates"].as_array().and_then(|c| c.first()) else {
        if let Some(reason) = v["promptFeedback"]["blockReason"].as_str() {
            bail!("prompt was blocked by the model API ({reason})");
        }
        return Ok(String::new());
    };

    let text = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|p| p.get("thought").and_then(Value::as_bool) != Some(true))
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate["finishReason"].as_str() {
            debug!(finish_reason = reason, "Gemini candidate carried no text");
        }
    }
    Ok(text)
}
