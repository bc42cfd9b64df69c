//! Handlers for agency rights of connected users.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use immersion_core::error::CoreError;
use immersion_core::events::Topic;
use immersion_core::roles::AgencyRightRole;
use immersion_core::types::DbId;
use immersion_db::models::agency_right::{AgencyRightInput, UserAgencyRight};
use immersion_db::repositories::{AgencyRepo, AgencyRightRepo, OutboxRepo, UserRepo};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireBackOffice;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RightRequest {
    pub agency_id: DbId,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceRights {
    pub rights: Vec<AgencyRightInput>,
}

/// POST /api/v1/users/me/agency-rights
///
/// Ask for a right on an agency. The right stays `to-review` until
/// back-office or an agency admin grants a role.
pub async fn request_right(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(input): Json<RightRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserAgencyRight>>)> {
    AgencyRepo::find_by_id(&state.pool, input.agency_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id: input.agency_id,
        }))?;

    let mut tx = state.pool.begin().await?;
    let right = AgencyRightRepo::request(&mut *tx, auth_user.user_id, input.agency_id).await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::AgencyRightRequested,
        &json!({ "user_id": auth_user.user_id, "agency_id": input.agency_id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = auth_user.user_id,
        agency_id = input.agency_id,
        "Agency right requested",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: right })))
}

/// PUT /api/v1/admin/users/{id}/agency-rights
///
/// Replace every right of a user.
pub async fn replace_rights(
    RequireBackOffice(admin): RequireBackOffice,
    State(state): State<AppState>,
    Path(user_id): Path<DbId>,
    Json(input): Json<ReplaceRights>,
) -> AppResult<Json<DataResponse<Vec<UserAgencyRight>>>> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }))?;

    for (i, right) in input.rights.iter().enumerate() {
        if AgencyRightRole::parse(&right.role).is_none() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Unknown agency right role '{}'",
                right.role
            ))));
        }
        if input.rights[..i].iter().any(|r| r.agency_id == right.agency_id) {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Agency {} is listed more than once",
                right.agency_id
            ))));
        }
        AgencyRepo::find_by_id(&state.pool, right.agency_id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Agency",
                id: right.agency_id,
            }))?;
    }

    let mut tx = state.pool.begin().await?;
    let rights = AgencyRightRepo::replace_for_user(&mut tx, user_id, &input.rights).await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::AgencyRightsUpdated,
        &json!({ "user_id": user_id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        user_id,
        admin_id = admin.user_id,
        rights = rights.len(),
        "Agency rights replaced",
    );

    Ok(Json(DataResponse { data: rights }))
}
