//! Back-office handlers: dashboard, notification log and outbox health.

use axum::extract::{Path, Query, State};
use axum::Json;
use immersion_core::error::CoreError;
use immersion_core::validation::validate_siret;
use immersion_db::clamp_limit;
use immersion_db::models::dashboard::DashboardStats;
use immersion_db::models::notification::{Notification, NotificationFilter, KIND_EMAIL, KIND_SMS};
use immersion_db::models::outbox::OutboxEvent;
use immersion_db::repositories::{DashboardRepo, NotificationRepo, OutboxRepo};
use immersion_events::SiretEstablishment;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireBackOffice;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/admin/dashboard
pub async fn dashboard(
    RequireBackOffice(_admin): RequireBackOffice,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<DashboardStats>>> {
    let stats = DashboardRepo::stats(&state.pool).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/admin/notifications
pub async fn list_notifications(
    RequireBackOffice(_admin): RequireBackOffice,
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> AppResult<Json<DataResponse<Vec<Notification>>>> {
    if let Some(kind) = filter.kind.as_deref() {
        if kind != KIND_EMAIL && kind != KIND_SMS {
            return Err(AppError::BadRequest(format!(
                "Unknown notification kind '{kind}'"
            )));
        }
    }
    let notifications =
        NotificationRepo::list_latest(&state.pool, filter.kind.as_deref(), clamp_limit(filter.limit))
            .await?;
    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// GET /api/v1/admin/outbox/failed
///
/// Events that failed at least once, quarantined ones included.
pub async fn list_failed_events(
    RequireBackOffice(_admin): RequireBackOffice,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<OutboxEvent>>>> {
    let events = OutboxRepo::list_failed(&state.pool, clamp_limit(params.limit)).await?;
    Ok(Json(DataResponse { data: events }))
}

/// GET /api/v1/siret/{siret}
///
/// Look a business up in the registry, e.g. to prefill a form.
pub async fn get_siret(
    State(state): State<AppState>,
    Path(siret): Path<String>,
) -> AppResult<Json<DataResponse<SiretEstablishment>>> {
    validate_siret(&siret)?;
    let establishment = state
        .siret_gateway
        .get_establishment(&siret)
        .await
        .map_err(|e| AppError::InternalError(format!("Business registry error: {e}")))?
        .ok_or(AppError::Core(CoreError::NotFoundByKey {
            entity: "Siret",
            key: siret,
        }))?;
    Ok(Json(DataResponse {
        data: establishment,
    }))
}
