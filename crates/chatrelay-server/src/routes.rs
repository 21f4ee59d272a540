// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Request handlers.
//!
//! | Method | Path      | Handler  |
//! |--------|-----------|----------|
//! | GET    | `/`       | [`index`]  |
//! | POST   | `/chat`   | [`chat`]   |
//! | GET    | `/health` | [`health`] |

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{AppState, ServerError};

/// Page served when the configured UI file cannot be read.
pub const BUILTIN_PAGE: &str = include_str!("../assets/chat.html");

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Body of every `/chat` response, success or failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub provider: String,
    pub model: String,
    pub sessions: usize,
}

/// GET / — the chat page, never cached by the browser.
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let page = match tokio::fs::read_to_string(state.ui_path.as_path()).await {
        Ok(html) => html,
        Err(e) => {
            debug!(path = %state.ui_path.display(), "UI file unavailable ({e}); serving built-in page");
            BUILTIN_PAGE.to_string()
        }
    };
    (
        [(header::CACHE_CONTROL, "no-cache, no-store"), (header::EXPIRES, "-1")],
        Html(page),
    )
}

/// POST /chat
///
/// Oversized, unreadable or non-JSON bodies still answer with a
/// `{"reply": …}` payload.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatReply>, ServerError> {
    let body = body.map_err(|rejection| {
        warn!(status = %rejection.status(), "rejecting chat body: {}", rejection.body_text());
        ServerError::from(rejection)
    })?;
    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("rejecting malformed chat body: {e}");
        ServerError::from(e)
    })?;

    let reply = state
        .service
        .chat(request.session_id.as_deref(), request.message.as_deref())
        .await?;
    Ok(Json(ChatReply { reply }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let provider = state.service.provider();
    Json(HealthReport {
        status: "ok".to_string(),
        provider: provider.name().to_string(),
        model: provider.model_name().to_string(),
        sessions: state.service.sessions().len(),
    })
}
