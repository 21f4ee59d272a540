// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use crate::Turn;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Generate the next model reply for `transcript`.
    ///
    /// The transcript is sent as-is; the provider does not check that roles
    /// alternate.  Returns the raw reply text, which may be empty when the
    /// model produced no text.
    async fn generate(&self, transcript: &[Turn]) -> anyhow::Result<String>;
}
