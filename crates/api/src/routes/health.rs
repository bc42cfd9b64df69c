use axum::extract::State;
use axum::{routing::get, Json, Router};
use immersion_db::repositories::OutboxRepo;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    /// Outbox events not dispatched yet. A growing backlog means the
    /// crawler or a delivery gateway is stuck.
    pub outbox_backlog: Option<i64>,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = immersion_db::health_check(&state.pool).await.is_ok();
    let outbox_backlog = if db_healthy {
        OutboxRepo::count_backlog(&state.pool).await.ok()
    } else {
        None
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        outbox_backlog,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
