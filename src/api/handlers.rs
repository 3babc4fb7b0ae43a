//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::probe::{ProbeExecutor, ProbeName, ProbeOutcome};

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Executor shared by every probe route.
    pub executor: Arc<ProbeExecutor>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(executor: ProbeExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            metrics: None,
        }
    }

    /// Expose metrics through the given handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("executor", &self.executor)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Successful probe response.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// `OK (<field>=<value>)`.
    pub message: String,
}

/// Problem body returned with a 500.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemResponse {
    /// Short summary.
    pub title: String,
    /// HTTP status.
    pub status: u16,
    /// Error text.
    pub detail: String,
}

/// Optional key for lookup probes.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    /// Blob id.
    #[serde(rename = "blobId")]
    pub blob_id: Option<String>,
}

impl IntoResponse for ProbeOutcome {
    fn into_response(self) -> Response {
        match self {
            ProbeOutcome::Success { message } => {
                (StatusCode::OK, Json(MessageResponse { message })).into_response()
            }
            ProbeOutcome::Failure { error_detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProblemResponse {
                    title: "Internal server error".to_string(),
                    status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    detail: error_detail,
                }),
            )
                .into_response(),
        }
    }
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Prometheus scrape handler - 404 when no recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Probe without a key.
pub async fn probe(state: AppState, name: ProbeName) -> ProbeOutcome {
    state.executor.run(name, None).await
}

/// Probe keyed by the last path segment.
pub async fn probe_with_path_key(
    state: AppState,
    name: ProbeName,
    Path(key): Path<String>,
) -> ProbeOutcome {
    state.executor.run(name, Some(key)).await
}

/// Probe keyed by the optional `blobId` query parameter.
pub async fn probe_with_query_key(
    state: AppState,
    name: ProbeName,
    Query(query): Query<KeyQuery>,
) -> ProbeOutcome {
    state.executor.run(name, query.blob_id).await
}
