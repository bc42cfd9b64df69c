use std::sync::Arc;

use immersion_events::SiretGateway;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: immersion_db::DbPool,
    /// Server configuration (JWT and magic-link secrets, frontend URL).
    pub config: Arc<ServerConfig>,
    /// Business registry used to check submitted sirets.
    pub siret_gateway: Arc<dyn SiretGateway>,
}
