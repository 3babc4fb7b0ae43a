//! HTTP API route definitions.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health, metrics, probe, probe_with_path_key, probe_with_query_key, AppState, KeyQuery,
};
use crate::probe::{registry, KeyMode};

/// Create the API router: one route per registered probe plus health/metrics.
pub fn create_router(state: AppState) -> Router {
    let mut router: Router<AppState> = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics));

    for descriptor in registry() {
        let name = descriptor.name;

        // Keyed routes also answer without the key, so the caller gets the
        // missing-parameter failure instead of a route miss.
        if let Some(bare) = descriptor.keyless_path() {
            let handler = get(move |State(state): State<AppState>| probe(state, name));
            router = router
                .route(bare, handler.clone())
                .route(&format!("{bare}/"), handler);
        }

        router = match descriptor.key_mode {
            KeyMode::Unused => router.route(
                descriptor.path,
                get(move |State(state): State<AppState>| probe(state, name)),
            ),
            KeyMode::Required => router.route(
                descriptor.path,
                get(move |State(state): State<AppState>, key: Path<String>| {
                    probe_with_path_key(state, name, key)
                }),
            ),
            KeyMode::Optional => router.route(
                descriptor.path,
                get(move |State(state): State<AppState>, query: Query<KeyQuery>| {
                    probe_with_query_key(state, name, query)
                }),
            ),
        };
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
