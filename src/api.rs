use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::status::StatusReport;

#[derive(Clone)]
pub struct ApiState {
    pub status: Arc<StatusReport>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

async fn status(State(state): State<ApiState>) -> Json<StatusReport> {
    Json(state.status.as_ref().clone())
}

async fn render_metrics(State(state): State<ApiState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
