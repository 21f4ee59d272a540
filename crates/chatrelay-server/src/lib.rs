// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! HTTP front end for the chat relay.
//!
//! A single axum router serves the chat page, the chat endpoint and a health
//! probe.  CORS is fully open: any origin is mirrored back and credentials
//! are allowed.

mod error;
pub mod routes;

use std::{future::Future, path::PathBuf, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use chatrelay_config::ServerConfig;
use chatrelay_core::ChatService;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use error::ServerError;
pub use routes::{ChatReply, ChatRequest, HealthReport, BUILTIN_PAGE};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub ui_path: Arc<PathBuf>,
}

pub fn router(service: Arc<ChatService>, config: &ServerConfig) -> Router {
    let state = AppState { service, ui_path: Arc::new(config.ui_path.clone()) };

    Router::new()
        .route("/", get(routes::index))
        .route("/chat", post(routes::chat))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind` and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: &ServerConfig, service: Arc<ChatService>) -> Result<(), ServerError> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|source| ServerError::Bind { addr: config.bind.clone(), source })?;
    serve_on(listener, config, service, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    listener: TcpListener,
    config: &ServerConfig,
    service: Arc<ChatService>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        %addr,
        provider = service.provider().name(),
        model = service.provider().model_name(),
        "chat relay listening"
    );

    axum::serve(listener, router(service, config))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("chat relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown requested");
}
