// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Wire-level tests for the Gemini driver against a local stand-in server.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chatrelay_model::{GoogleProvider, ModelProvider, RetryPolicy, Turn};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Upstream {
    calls: Arc<AtomicUsize>,
    /// Status codes returned before the first success.
    failures: Arc<Mutex<Vec<StatusCode>>>,
    last_key: Arc<Mutex<Option<String>>>,
    last_body: Arc<Mutex<Option<Value>>>,
}

async fn generate_content(
    State(state): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.calls.fetch_add(1, Ordering::SeqCst);
    *state.last_key.lock().unwrap() = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_body.lock().unwrap() = Some(body);

    let failure = {
        let mut failures = state.failures.lock().unwrap();
        (!failures.is_empty()).then(|| failures.remove(0))
    };
    if let Some(status) = failure {
        let err = json!({ "error": { "code": status.as_u16(), "message": "upstream says no" } });
        return (status, Json(err));
    }

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "1. first\n2. second" }] },
                "finishReason": "STOP"
            }]
        })),
    )
}

async fn spawn_upstream(state: Upstream) -> String {
    let app = Router::new()
        .route("/v1beta/models/*rest", post(generate_content))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn provider(base_url: String, max_retries: u32) -> GoogleProvider {
    GoogleProvider::new("gemini-1.5-flash".into(), Some("test-key".into()), Some(base_url), None, None)
        .with_retry_policy(RetryPolicy {
            timeout: Some(Duration::from_secs(5)),
            max_retries,
            initial_backoff: Duration::from_millis(5),
        })
}

#[tokio::test]
async fn sends_transcript_and_key_and_returns_text() {
    let state = Upstream::default();
    let base = spawn_upstream(state.clone()).await;
    let p = provider(base, 0);

    let reply = p
        .generate(&[Turn::user("hello"), Turn::model("➤ hi"), Turn::user("list two things")])
        .await
        .unwrap();
    assert_eq!(reply, "1. first\n2. second");

    assert_eq!(state.last_key.lock().unwrap().as_deref(), Some("test-key"));
    let body = state.last_body.lock().unwrap().clone().unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "list two things");
}

#[tokio::test]
async fn retries_service_unavailable_then_succeeds() {
    let state = Upstream::default();
    state
        .failures
        .lock()
        .unwrap()
        .extend([StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS]);
    let base = spawn_upstream(state.clone()).await;

    let reply = provider(base, 2).generate(&[Turn::user("hello")]).await.unwrap();
    assert_eq!(reply, "1. first\n2. second");
    assert_eq!(state.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let state = Upstream::default();
    state.failures.lock().unwrap().push(StatusCode::BAD_REQUEST);
    let base = spawn_upstream(state.clone()).await;

    let err = provider(base, 3).generate(&[Turn::user("hello")]).await.unwrap_err();
    assert_eq!(state.calls.load(Ordering::SeqCst), 1);
    let msg = err.to_string();
    assert!(msg.contains("400"), "{msg}");
    assert!(msg.contains("upstream says no"), "{msg}");
}

#[tokio::test]
async fn unreachable_upstream_fails_after_retries() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = provider(format!("http://{addr}"), 1)
        .generate(&[Turn::user("hello")])
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("request failed"), "{err:#}");
}
