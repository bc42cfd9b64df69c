//! Handlers for the `/conventions` resource.
//!
//! Every write runs in one transaction that locks the convention row, applies
//! the change and records the matching outbox event before commit.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use immersion_core::agency::AgencyStatus;
use immersion_core::convention::{normalize_and_validate, today, ConventionForm};
use immersion_core::convention_status::{
    check_justification, check_transition, status_after_signature, ConventionStatus,
    TransitionContext,
};
use immersion_core::error::CoreError;
use immersion_core::events::{topic_for_status, Topic};
use immersion_core::roles::AgencyRightRole;
use immersion_core::types::DbId;
use immersion_core::validation::email_hash;
use immersion_db::models::convention::{
    Convention, ConventionFilter, ConventionStatusChange, CreateConvention,
};
use immersion_db::repositories::{AgencyRepo, AgencyRightRepo, ConventionRepo, OutboxRepo};
use immersion_db::{clamp_limit, clamp_offset};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgConnection;

use crate::auth::magic_link::decode_expired_convention_jwt;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::convention_access::{party_emails, resolve_role, ConventionPrincipal};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: ConventionStatus,
    pub justification: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenewMagicLinkRequest {
    pub expired_jwt: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/conventions
///
/// Submit a new convention. It starts `READY_TO_SIGN` and the signatories
/// are asked to sign.
pub async fn create(
    State(state): State<AppState>,
    Json(mut form): Json<ConventionForm>,
) -> AppResult<(StatusCode, Json<DataResponse<Convention>>)> {
    let submitted_on = today();
    normalize_and_validate(&mut form, submitted_on)?;
    form.signatories.clear_signatures();
    ensure_active_agency(&state, form.agency_id).await?;

    let mut tx = state.pool.begin().await?;
    let convention = ConventionRepo::create(
        &mut *tx,
        &CreateConvention {
            form: &form,
            date_submission: submitted_on,
        },
    )
    .await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::ConventionSubmitted,
        &json!({ "convention_id": convention.id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        convention_id = convention.id,
        agency_id = convention.agency_id,
        "Convention submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: convention })))
}

/// GET /api/v1/conventions/{id}
pub async fn get_by_id(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Convention>>> {
    let mut conn = state.pool.acquire().await?;
    let convention = ConventionRepo::find_by_id(&mut *conn, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id,
        }))?;
    resolve_role(&mut conn, &principal, &convention).await?;

    Ok(Json(DataResponse { data: convention }))
}

/// PUT /api/v1/conventions/{id}
///
/// Replace the content of a `DRAFT` or `READY_TO_SIGN` convention. Previous
/// signatures are dropped and the convention goes back to `READY_TO_SIGN`.
pub async fn update(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(mut form): Json<ConventionForm>,
) -> AppResult<Json<DataResponse<Convention>>> {
    let mut tx = state.pool.begin().await?;
    let convention = lock_convention(&mut tx, id).await?;
    let role = resolve_role(&mut tx, &principal, &convention).await?;
    let status = current_status(&convention)?;

    check_transition(
        status,
        ConventionStatus::ReadyToSign,
        role,
        TransitionContext::default(),
    )?;
    normalize_and_validate(&mut form, convention.date_submission)?;
    form.signatories.clear_signatures();
    if form.agency_id != convention.agency_id {
        ensure_active_agency(&state, form.agency_id).await?;
    }

    let updated = ConventionRepo::update_form(&mut *tx, id, &form)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id,
        }))?;
    OutboxRepo::save(
        &mut *tx,
        Topic::ConventionSubmitted,
        &json!({ "convention_id": id }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(convention_id = id, role = %role, "Convention updated");

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/conventions/{id}/sign
///
/// Sign with the signatory role of the magic link.
pub async fn sign(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Convention>>> {
    principal.magic_link()?;

    let mut tx = state.pool.begin().await?;
    let convention = lock_convention(&mut tx, id).await?;
    let role = resolve_role(&mut tx, &principal, &convention).await?;
    let status = current_status(&convention)?;

    if !role.is_signatory() {
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Role '{role}' cannot sign a convention"
        ))));
    }
    if !status.accepts_signatures() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "A convention with status '{status}' cannot be signed"
        ))));
    }

    let mut signatories = convention.signatories.0.clone();
    signatories.sign(role, Utc::now())?;
    let next = status_after_signature(signatories.signed_count(), signatories.required_count());
    check_transition(status, next, role, TransitionContext::default())?;

    let updated = ConventionRepo::update_status(
        &mut *tx,
        id,
        &ConventionStatusChange {
            status: next,
            justification: None,
            signatories: Some(signatories),
            date_validation: None,
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Convention",
        id,
    }))?;
    OutboxRepo::save(
        &mut *tx,
        topic_for_status(next),
        &json!({ "convention_id": id, "role": role }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(convention_id = id, role = %role, status = %next, "Convention signed");

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/conventions/{id}/status
///
/// Move a convention through review: acceptance, rejection, cancellation,
/// deprecation or a modification request.
pub async fn change_status(
    principal: ConventionPrincipal,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<StatusChangeRequest>,
) -> AppResult<Json<DataResponse<Convention>>> {
    let target = input.status;
    if matches!(
        target,
        ConventionStatus::PartiallySigned | ConventionStatus::InReview
    ) {
        return Err(AppError::Core(CoreError::Validation(
            "Signatures go through the signature endpoint".into(),
        )));
    }

    let mut tx = state.pool.begin().await?;
    let convention = lock_convention(&mut tx, id).await?;
    let role = resolve_role(&mut tx, &principal, &convention).await?;
    let status = current_status(&convention)?;

    let agency = AgencyRepo::find_by_id(&mut *tx, convention.agency_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id: convention.agency_id,
        }))?;
    let ctx = TransitionContext {
        requires_counsellor_review: agency.refers_to_agency_id.is_some(),
    };

    let justification = input
        .justification
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty());
    check_transition(status, target, role, ctx)?;
    check_justification(target, justification.as_deref())?;

    let signatories = match target {
        ConventionStatus::Draft | ConventionStatus::ReadyToSign => {
            let mut signatories = convention.signatories.0.clone();
            signatories.clear_signatures();
            Some(signatories)
        }
        _ => None,
    };
    let date_validation =
        (target == ConventionStatus::AcceptedByValidator).then(Utc::now);

    let updated = ConventionRepo::update_status(
        &mut *tx,
        id,
        &ConventionStatusChange {
            status: target,
            justification: justification.clone(),
            signatories,
            date_validation,
        },
    )
    .await?
    .ok_or(AppError::Core(CoreError::NotFound {
        entity: "Convention",
        id,
    }))?;
    OutboxRepo::save(
        &mut *tx,
        topic_for_status(target),
        &json!({
            "convention_id": id,
            "role": role,
            "justification": justification,
        }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        convention_id = id,
        role = %role,
        from = %status,
        to = %target,
        "Convention status changed",
    );

    Ok(Json(DataResponse { data: updated }))
}

/// GET /api/v1/conventions
///
/// Conventions of the agencies the connected user has a granted right on.
pub async fn list(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(params): Query<ConventionFilter>,
) -> AppResult<Json<DataResponse<Vec<Convention>>>> {
    let status = match params.status.as_deref() {
        Some(s) => Some(ConventionStatus::parse(s).ok_or_else(|| {
            AppError::Core(CoreError::Validation(format!("Unknown convention status '{s}'")))
        })?),
        None => None,
    };

    let agency_ids: Vec<DbId> = AgencyRightRepo::list_for_user(&state.pool, auth_user.user_id)
        .await?
        .into_iter()
        .filter(|right| {
            AgencyRightRole::parse(&right.role).is_some_and(|r| r.as_role().is_some())
        })
        .map(|right| right.agency_id)
        .collect();

    let conventions = ConventionRepo::list_for_agencies(
        &state.pool,
        &agency_ids,
        status.map(|s| s.as_str()),
        clamp_limit(params.limit),
        clamp_offset(params.offset),
    )
    .await?;

    Ok(Json(DataResponse { data: conventions }))
}

/// POST /api/v1/conventions/magic-link/renew
///
/// Ask for a fresh link in place of an expired one. The new link is emailed
/// to the holder of the old one.
pub async fn renew_magic_link(
    State(state): State<AppState>,
    Json(input): Json<RenewMagicLinkRequest>,
) -> AppResult<StatusCode> {
    let claims = decode_expired_convention_jwt(&input.expired_jwt, &state.config.magic_link)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid magic link".into())))?;

    let mut tx = state.pool.begin().await?;
    let convention = ConventionRepo::find_by_id(&mut *tx, claims.convention_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id: claims.convention_id,
        }))?;

    let emails = party_emails(&mut tx, &convention, claims.role).await?;
    if !emails.iter().any(|email| email_hash(email) == claims.email_hash) {
        return Err(AppError::Core(CoreError::Forbidden(
            "This link no longer matches a party of the convention".into(),
        )));
    }

    OutboxRepo::save(
        &mut *tx,
        Topic::MagicLinkRenewalRequested,
        &json!({
            "convention_id": convention.id,
            "role": claims.role,
            "email_hash": claims.email_hash,
        }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        convention_id = convention.id,
        role = %claims.role,
        "Magic link renewal requested",
    );

    Ok(StatusCode::ACCEPTED)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn lock_convention(conn: &mut PgConnection, id: DbId) -> AppResult<Convention> {
    ConventionRepo::find_by_id_for_update(&mut *conn, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Convention",
            id,
        }))
}

pub(crate) fn current_status(convention: &Convention) -> AppResult<ConventionStatus> {
    convention.status().ok_or_else(|| {
        AppError::InternalError(format!(
            "Convention {} has unknown status '{}'",
            convention.id, convention.status
        ))
    })
}

async fn ensure_active_agency(state: &AppState, agency_id: DbId) -> AppResult<()> {
    let agency = AgencyRepo::find_by_id(&state.pool, agency_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Agency",
            id: agency_id,
        }))?;
    if agency.status != AgencyStatus::Active.as_str() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Agency {agency_id} is not accepting conventions"
        ))));
    }
    Ok(())
}
