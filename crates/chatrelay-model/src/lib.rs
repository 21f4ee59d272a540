mod types;
mod provider;
mod google;
mod mock;
pub mod retry;

pub use types::*;
pub use provider::ModelProvider;
pub use google::{GoogleProvider, DEFAULT_BASE_URL};
pub use mock::{MockProvider, Scripted, ScriptedMockProvider};
pub use retry::RetryPolicy;

use anyhow::bail;
use chatrelay_config::ModelConfig;

/// Construct a boxed [`ModelProvider`] from configuration.
///
/// Provider selection:
/// - `"google"` → [`GoogleProvider`]
/// - `"mock"` → [`MockProvider`] (echo-back)
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Box<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "google" | "gemini" => {
            let key = resolve_api_key(cfg);
            if key.is_none() {
                tracing::warn!(
                    env = cfg.api_key_env.as_deref().unwrap_or(""),
                    "no Gemini API key configured; every generation call will fail"
                );
            }
            Ok(Box::new(
                GoogleProvider::new(
                    cfg.name.clone(),
                    key,
                    cfg.base_url.clone(),
                    cfg.max_tokens,
                    cfg.temperature,
                )
                .with_system_instruction(cfg.system_instruction.clone())
                .with_retry_policy(RetryPolicy::from_config(cfg)),
            ))
        }
        "mock" => Ok(Box::new(MockProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}

fn resolve_api_key(cfg: &ModelConfig) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    if let Some(env) = &cfg.api_key_env {
        return std::env::var(env).ok().filter(|k| !k.is_empty());
    }
    None
}
