//! Handlers for the `/agencies` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use immersion_core::agency::{
    validate_agency_fields, validate_status_transition, AgencyFields, AgencyKind, AgencyStatus,
};
use immersion_core::error::CoreError;
use immersion_core::events::Topic;
use immersion_core::roles::AgencyRightRole;
use immersion_core::types::DbId;
use immersion_db::models::agency::{Agency, AgencyFilter, AgencyPublic, CreateAgency, UpdateAgency};
use immersion_db::repositories::{AgencyRepo, AgencyRightRepo, OutboxRepo};
use serde::Deserialize;
use serde_json::json;

use super::department_of;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireBackOffice;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /admin/agencies/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct AgencyStatusRequest {
    pub status: AgencyStatus,
    pub justification: Option<String>,
}

/// GET /api/v1/agencies
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<AgencyFilter>,
) -> AppResult<Json<DataResponse<Vec<AgencyPublic>>>> {
    let agencies = AgencyRepo::list_active(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: agencies }))
}

/// GET /api/v1/agencies/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<AgencyPublic>>> {
    let agency = find_agency(&state, id).await?;
    Ok(Json(DataResponse {
        data: AgencyPublic::from(&agency),
    }))
}

/// POST /api/v1/agencies
///
/// Register an agency. It stays `needsReview` until back-office activates it.
pub async fn create(
    State(state): State<AppState>,
    Json(mut input): Json<CreateAgency>,
) -> AppResult<(StatusCode, Json<DataResponse<Agency>>)> {
    if AgencyKind::parse(&input.kind).is_none() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Unknown agency kind '{}'",
            input.kind
        ))));
    }
    normalize_emails(&mut input.counsellor_emails);
    normalize_emails(&mut input.validator_emails);

    validate_agency_fields(&AgencyFields {
        name: &input.name,
        address: &input.address,
        postcode: &input.postcode,
        city: &input.city,
        agency_siret: input.agency_siret.as_deref(),
        validator_emails: &input.validator_emails,
        counsellor_emails: &input.counsellor_emails,
        refers_to_agency: input.refers_to_agency_id.is_some(),
    })?;
    input.department_code = department_of(&input.postcode)?;

    let mut tx = state.pool.begin().await?;
    if let Some(referred_id) = input.refers_to_agency_id {
        // Held until commit so the referred agency cannot close meanwhile.
        let referred = AgencyRepo::find_by_id_for_share(&mut *tx, referred_id)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Validation(format!(
                    "Referred agency {referred_id} does not exist"
                )))
            })?;
        if referred.status != AgencyStatus::Active.as_str() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Referred agency {referred_id} is not active"
            ))));
        }
        if referred.refers_to_agency_id.is_some() {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Agency {referred_id} already refers to another agency"
            ))));
        }
    }

    let agency = AgencyRepo::create(&mut *tx, &input).await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::AgencyRegistered,
        &json!({ "agency_id": agency.id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(agency_id = agency.id, kind = %agency.kind, "Agency registered");

    Ok((StatusCode::CREATED, Json(DataResponse { data: agency })))
}

/// PUT /api/v1/agencies/{id}
///
/// Edit an agency. Back-office, or an admin of that agency.
pub async fn update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<DbId>,
    Json(mut input): Json<UpdateAgency>,
) -> AppResult<Json<DataResponse<Agency>>> {
    let agency = find_agency(&state, id).await?;

    if !auth_user.is_back_office() {
        let right = AgencyRightRepo::find(&state.pool, auth_user.user_id, id).await?;
        let is_admin = right
            .and_then(|r| AgencyRightRole::parse(&r.role))
            .is_some_and(|r| r == AgencyRightRole::AgencyAdmin);
        if !is_admin {
            return Err(AppError::Core(CoreError::Forbidden(
                "Agency admin role required".into(),
            )));
        }
    }

    if let Some(emails) = input.counsellor_emails.as_mut() {
        normalize_emails(emails);
    }
    if let Some(emails) = input.validator_emails.as_mut() {
        normalize_emails(emails);
    }

    validate_agency_fields(&AgencyFields {
        name: input.name.as_deref().unwrap_or(&agency.name),
        address: input.address.as_deref().unwrap_or(&agency.address),
        postcode: input.postcode.as_deref().unwrap_or(&agency.postcode),
        city: input.city.as_deref().unwrap_or(&agency.city),
        agency_siret: input
            .agency_siret
            .as_deref()
            .or(agency.agency_siret.as_deref()),
        validator_emails: input
            .validator_emails
            .as_deref()
            .unwrap_or(agency.validator_emails.as_slice()),
        counsellor_emails: input
            .counsellor_emails
            .as_deref()
            .unwrap_or(agency.counsellor_emails.as_slice()),
        refers_to_agency: agency.refers_to_agency_id.is_some(),
    })?;
    if let Some(postcode) = &input.postcode {
        input.department_code = Some(department_of(postcode)?);
    }

    let updated = AgencyRepo::update(&state.pool, id, &input)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id,
        }))?;

    tracing::info!(agency_id = id, user_id = auth_user.user_id, "Agency updated");

    Ok(Json(DataResponse { data: updated }))
}

/// PUT /api/v1/admin/agencies/{id}/status
pub async fn change_status(
    RequireBackOffice(admin): RequireBackOffice,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AgencyStatusRequest>,
) -> AppResult<Json<DataResponse<Agency>>> {
    let mut tx = state.pool.begin().await?;
    let agency = AgencyRepo::find_by_id_for_update(&mut *tx, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id,
        }))?;
    let current = AgencyStatus::parse(&agency.status).ok_or_else(|| {
        AppError::InternalError(format!("Agency {id} has unknown status '{}'", agency.status))
    })?;
    let justification = input
        .justification
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty());
    validate_status_transition(current, input.status, justification)?;

    if input.status == AgencyStatus::Closed {
        let referring = AgencyRepo::count_referring(&mut *tx, id).await?;
        if referring > 0 {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "{referring} agencies still refer their conventions to agency {id}"
            ))));
        }
    }

    let updated = AgencyRepo::update_status(&mut *tx, id, input.status, justification)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id,
        }))?;
    if let Some(topic) = topic_for_agency_status(input.status) {
        OutboxRepo::save(&mut *tx, topic, &json!({ "agency_id": id })).await?;
    }
    tx.commit().await?;

    tracing::info!(
        agency_id = id,
        admin_id = admin.user_id,
        from = %current,
        to = %input.status,
        "Agency status changed",
    );

    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn topic_for_agency_status(status: AgencyStatus) -> Option<Topic> {
    match status {
        AgencyStatus::Active => Some(Topic::AgencyActivated),
        AgencyStatus::Rejected => Some(Topic::AgencyRejected),
        AgencyStatus::Closed => Some(Topic::AgencyClosed),
        AgencyStatus::NeedsReview => None,
    }
}

async fn find_agency(state: &AppState, id: DbId) -> AppResult<Agency> {
    AgencyRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id,
        }))
}

fn normalize_emails(emails: &mut Vec<String>) {
    for email in emails.iter_mut() {
        *email = email.trim().to_lowercase();
    }
    emails.sort();
    emails.dedup();
}
