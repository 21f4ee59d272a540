// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-attempt timeout and bounded retry with exponential backoff.
//!
//! Drivers classify each failed attempt as [`AttemptError::Transient`] or
//! [`AttemptError::Fatal`]; only transient failures and timeouts are retried.

use std::{future::Future, time::Duration};

use chatrelay_config::ModelConfig;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Timeout for a single attempt.  `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled after each retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self {
            timeout: (cfg.timeout_secs > 0).then(|| Duration::from_secs(cfg.timeout_secs)),
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }

    /// Single attempt, no timeout.
    pub fn none() -> Self {
        Self { timeout: None, max_retries: 0, initial_backoff: Duration::ZERO }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Connection failures, HTTP 429 and 5xx.
    #[error("{0:#}")]
    Transient(anyhow::Error),
    #[error("{0:#}")]
    Fatal(anyhow::Error),
}

impl AttemptError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AttemptError::Fatal(_))
    }

    fn into_anyhow(self) -> anyhow::Error {
        match self {
            AttemptError::Transient(e) | AttemptError::Fatal(e) => e,
            timeout @ AttemptError::Timeout(_) => anyhow::Error::new(timeout),
        }
    }
}

/// Run `attempt` under `policy`, returning the first success or the last error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut attempt: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut delay = policy.initial_backoff;
    let mut retries = 0;
    loop {
        let outcome = match policy.timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AttemptError::Timeout(limit)),
            },
            None => attempt().await,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                warn!(attempt = retries, error = %e, "{what} failed, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e.into_anyhow()),
        }
    }
}
