//! Handlers for end-of-immersion assessments.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use immersion_core::assessment::{validate_assessment, AssessmentForm};
use immersion_core::convention::today;
use immersion_core::error::CoreError;
use immersion_core::events::Topic;
use immersion_core::roles::Role;
use immersion_core::types::DbId;
use immersion_db::models::assessment::Assessment;
use immersion_db::repositories::{AssessmentRepo, ConventionRepo, OutboxRepo};
use serde_json::json;

use super::conventions::current_status;
use crate::error::{AppError, AppResult};
use crate::middleware::convention_access::{resolve_role, ConventionPrincipal};
use crate::response::DataResponse;
use crate::state::AppState;

/// Roles allowed to fill the assessment of a convention.
const ASSESSMENT_ROLES: [Role; 3] = [
    Role::EstablishmentTutor,
    Role::EstablishmentRepresentative,
    Role::BackOffice,
];

/// POST /api/v1/conventions/{id}/assessment
pub async fn create(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(convention_id): Path<DbId>,
    Json(form): Json<AssessmentForm>,
) -> AppResult<(StatusCode, Json<DataResponse<Assessment>>)> {
    let mut tx = state.pool.begin().await?;
    let convention = ConventionRepo::find_by_id(&mut *tx, convention_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id: convention_id,
        }))?;
    let role = resolve_role(&mut tx, &principal, &convention).await?;
    if !ASSESSMENT_ROLES.contains(&role) {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Role '{role}' cannot fill the assessment"
        ))));
    }

    validate_assessment(
        &form,
        current_status(&convention)?,
        convention.date_start,
        convention.date_end,
        today(),
    )?;

    let assessment = AssessmentRepo::create(&mut *tx, convention_id, &form).await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::AssessmentCreated,
        &json!({ "convention_id": convention_id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        convention_id,
        role = %role,
        status = form.status.as_str(),
        "Assessment created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: assessment })))
}

/// GET /api/v1/conventions/{id}/assessment
pub async fn get_by_convention(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(convention_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Assessment>>> {
    let mut conn = state.pool.acquire().await?;
    let convention = ConventionRepo::find_by_id(&mut *conn, convention_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id: convention_id,
        }))?;
    resolve_role(&mut conn, &principal, &convention).await?;

    let assessment = AssessmentRepo::find_by_convention(&mut *conn, convention_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundByKey {
                entity: "Assessment",
                key: format!("of convention {convention_id}"),
            })
        })?;

    Ok(Json(DataResponse { data: assessment }))
}
