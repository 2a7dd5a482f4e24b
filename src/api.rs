use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::ingest::Ingestor;
use crate::record::NewsRecord;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub monitor_map_path: PathBuf,
    pub webhook_path: String,
}

pub fn create_router(state: AppState) -> Router {
    let webhook_path = state.webhook_path.clone();

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(&webhook_path, post(receive_webhook))
        .route("/view-webhooks", get(view_webhooks))
        .route("/view-webhooks/{id}", get(view_webhook))
        .route("/admin/reload-monitor-map", post(admin_reload_monitor_map))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Largest webhook body read. Anything bigger is dropped as malformed, still with a 200.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Always `200 {"status":"received"}`; the outcome only goes to logs and metrics.
async fn receive_webhook(State(state): State<AppState>, body: Body) -> impl IntoResponse {
    // Run detached so a dropped upstream connection cannot cut a group in half.
    let ingestor = state.ingestor.clone();
    let task = tokio::spawn(async move {
        match axum::body::to_bytes(body, MAX_WEBHOOK_BODY_BYTES).await {
            Ok(raw) => ingestor.handle_notification(&raw).await,
            Err(e) => ingestor.reject_body(format!(
                "body unreadable or over {MAX_WEBHOOK_BODY_BYTES} bytes: {e}"
            )),
        }
    });

    if let Err(e) = task.await {
        tracing::error!(target: "ingest", error = %e, "ingest task panicked");
    }

    (StatusCode::OK, Json(json!({ "status": "received" })))
}

#[derive(serde::Serialize)]
struct WebhookList {
    total: usize,
    webhooks: Vec<NewsRecord>,
}

async fn view_webhooks(State(state): State<AppState>) -> Response {
    match state.ingestor.store().select_all().await {
        Ok(rows) => Json(WebhookList {
            total: rows.len(),
            webhooks: rows,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "listing news records failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn view_webhook(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.ingestor.store().select_by_id(id).await {
        Ok(Some(rec)) => Json(rec).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not found" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, id, "reading news record failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn admin_reload_monitor_map(State(state): State<AppState>) -> Response {
    match state
        .ingestor
        .registry()
        .reload_from(&state.monitor_map_path)
    {
        Ok(entries) => Json(json!({ "status": "reloaded", "entries": entries })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failed", "error": format!("{e:#}") })),
        )
            .into_response(),
    }
}
