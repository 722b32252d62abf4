//! HTTP surface of the relay.
//!
//! `POST /webhook` runs the pipeline to completion before answering, so
//! callers get 204 only after the announcement was attempted.
//! `GET /health` reports the selected speech backend.

use std::any::Any;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::pipeline::WebhookPipeline;
use crate::error::{AppError, ErrorResponse};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<WebhookPipeline>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    backend: &'static str,
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(handle_health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `host:port`. The host may be a hostname or an IPv4/IPv6 literal.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

/// Bind and serve until the process stops.
pub async fn serve(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let listener = bind(host, port).await?;
    info!("Webhook relay listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    info!(
        "Webhook received ({} bytes, content-type: {})",
        body.len(),
        content_type.as_deref().unwrap_or("none")
    );

    // Own task: a dropped connection doesn't cut an announcement short,
    // and a panic surfaces as a JoinError instead of tearing down the handler.
    let pipeline = Arc::clone(&state.pipeline);
    let run = tokio::spawn(async move { pipeline.handle(&body, content_type.as_deref()).await });

    match run.await {
        Ok(Ok(_delivery)) => Ok(StatusCode::NO_CONTENT),
        Ok(Err(e)) => Err(e.into()),
        Err(e) => Err(AppError::Internal(format!("pipeline task failed: {e}"))),
    }
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.pipeline.backend_name(),
    })
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {detail}");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::internal())).into_response()
}
