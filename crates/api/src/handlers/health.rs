//! Health check endpoint for load balancers and monitoring.
//!
//! Returns 200 OK if Redis is reachable, 503 Service Unavailable otherwise.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    redis: bool,
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let redis_ok = match state.stores.atomic.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("redis ping failed: {:?}", e);
            false
        }
    };

    let response = HealthResponse {
        status: if redis_ok { "ok" } else { "unhealthy" },
        redis: redis_ok,
    };

    let status = if redis_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
