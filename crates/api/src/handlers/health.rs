//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if the suppression store is reachable (or disabled),
//! 503 Service Unavailable otherwise. Unsubscribes keep working either way.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    store_reachable: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.stores.suppressions.as_ref();
    let reachable = store.health_check().await.unwrap_or(false);

    let response = HealthResponse {
        status: if reachable { "ok" } else { "unhealthy" },
        store: store.backend(),
        store_reachable: reachable,
    };

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
