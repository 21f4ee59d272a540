// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatrelay_core::ChatError;
use thiserror::Error;

use crate::ChatReply;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Http(#[from] std::io::Error),

    #[error("malformed request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("unreadable request body: {0}")]
    UnreadableBody(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<BytesRejection> for ServerError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::PayloadTooLarge(rejection.body_text())
        } else {
            ServerError::UnreadableBody(rejection.body_text())
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Chat(ChatError::EmptyInput) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `reply` field of the error payload.
    pub fn reply(&self) -> String {
        match self {
            ServerError::Chat(e) => e.reply(),
            ServerError::Body(e) => format!("❌ Error: {e}"),
            other => format!("❌ Error: {other}"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), Json(ChatReply { reply: self.reply() })).into_response()
    }
}
