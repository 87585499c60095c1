use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::monitor::Monitor;

#[derive(Clone)]
pub struct AppState {
    monitor: Arc<Monitor>,
    // one run (or clear) at a time per process; the seen-set is read-modify-write
    run_lock: Arc<Mutex<()>>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor: Arc::new(monitor),
            run_lock: Arc::new(Mutex::new(())),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/check", get(check).post(check))
        .route("/api/clear-seen", get(clear_seen).post(clear_seen))
        .route("/api/debug-seen", get(debug_seen))
        .route("/metrics", get(metrics))
        .route("/favicon.ico", get(no_content))
        .route("/favicon.png", get(no_content))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn check(State(state): State<AppState>) -> impl IntoResponse {
    let _guard = state.run_lock.lock().await;
    let report = state.monitor.run_once().await;
    let status = if report.succeeded {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

async fn clear_seen(State(state): State<AppState>) -> impl IntoResponse {
    let _guard = state.run_lock.lock().await;
    match state.monitor.clear_seen().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Cleared all seen posts",
                "timestamp": now_iso(),
            })),
        ),
        Err(e) => {
            tracing::error!(target: "api", error = %e, "clearing seen posts failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

async fn debug_seen(State(state): State<AppState>) -> impl IntoResponse {
    match state.monitor.seen_snapshot().await {
        Ok(set) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "seenPostsCount": set.len(),
                "seenPosts": set.into_vec(),
                "timestamp": now_iso(),
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": e.to_string() })),
        ),
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}
