//! Handlers for host establishments: registration, edition, search and
//! contact requests.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use immersion_core::error::CoreError;
use immersion_core::establishment::{
    normalize_and_validate, validate_contact_request, weekly_cap_reached, ContactRequest,
    EstablishmentForm, CONTACT_CAP_WINDOW_DAYS, CONTACT_COOLDOWN_DAYS,
};
use immersion_core::events::Topic;
use immersion_core::validation::{validate_appellation_code, validate_rome_code};
use immersion_db::clamp_limit;
use immersion_db::models::discussion::{CreateDiscussion, Discussion};
use immersion_db::models::establishment::{
    Establishment, EstablishmentWithOffers, SearchFilter, SearchResult,
};
use immersion_db::repositories::{DiscussionRepo, EstablishmentRepo, OutboxRepo};
use serde_json::json;

use super::department_of;
use crate::error::{AppError, AppResult};
use crate::middleware::establishment_access::EstablishmentPrincipal;
use crate::middleware::rbac::RequireBackOffice;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/establishments
///
/// Register an establishment as a host. The siret must name an open
/// establishment in the business registry.
pub async fn create(
    State(state): State<AppState>,
    Json(mut form): Json<EstablishmentForm>,
) -> AppResult<(StatusCode, Json<DataResponse<EstablishmentWithOffers>>)> {
    normalize_and_validate(&mut form)?;
    check_registry(&state, &form.siret).await?;
    let department_code = department_of(&form.postcode)?;

    if EstablishmentRepo::find_by_siret(&state.pool, &form.siret)
        .await?
        .is_some()
    {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Establishment {} is already registered",
            form.siret
        ))));
    }

    let mut tx = state.pool.begin().await?;
    let created = EstablishmentRepo::create(&mut tx, &form, &department_code).await?;
    OutboxRepo::save(
        &mut *tx,
        Topic::FormEstablishmentAdded,
        &json!({ "siret": form.siret }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        siret = %form.siret,
        offers = created.offers.len(),
        "Establishment registered",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/establishments/{siret}
pub async fn get_by_siret(
    principal: EstablishmentPrincipal,
    State(state): State<AppState>,
    Path(siret): Path<String>,
) -> AppResult<Json<DataResponse<EstablishmentWithOffers>>> {
    principal.ensure_siret(&siret)?;

    let mut conn = state.pool.acquire().await?;
    let establishment = EstablishmentRepo::find_with_offers(&mut conn, &siret)
        .await?
        .ok_or_else(|| not_found(&siret))?;

    Ok(Json(DataResponse {
        data: establishment,
    }))
}

/// PUT /api/v1/establishments/{siret}
pub async fn update(
    principal: EstablishmentPrincipal,
    State(state): State<AppState>,
    Path(siret): Path<String>,
    Json(mut form): Json<EstablishmentForm>,
) -> AppResult<Json<DataResponse<EstablishmentWithOffers>>> {
    principal.ensure_siret(&siret)?;
    if form.siret != siret {
        return Err(AppError::Core(CoreError::Validation(
            "The siret of an establishment cannot change".into(),
        )));
    }
    normalize_and_validate(&mut form)?;
    let department_code = department_of(&form.postcode)?;

    let mut tx = state.pool.begin().await?;
    let updated = EstablishmentRepo::update(&mut tx, &form, &department_code)
        .await?
        .ok_or_else(|| not_found(&siret))?;
    OutboxRepo::save(
        &mut *tx,
        Topic::FormEstablishmentEdited,
        &json!({ "siret": siret }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(siret = %siret, "Establishment updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/establishments/{siret}
pub async fn delete(
    RequireBackOffice(admin): RequireBackOffice,
    State(state): State<AppState>,
    Path(siret): Path<String>,
) -> AppResult<StatusCode> {
    let deleted = EstablishmentRepo::delete(&state.pool, &siret).await?;
    if deleted {
        tracing::info!(siret = %siret, admin_id = admin.user_id, "Establishment deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&siret))
    }
}

/// POST /api/v1/establishments/{siret}/edit-link
///
/// Email an edit link to the establishment contact.
pub async fn request_edit_link(
    State(state): State<AppState>,
    Path(siret): Path<String>,
) -> AppResult<StatusCode> {
    let establishment = find_establishment(&state, &siret).await?;

    OutboxRepo::save(
        &state.pool,
        Topic::EstablishmentEditLinkRequested,
        &json!({ "siret": establishment.siret }),
    )
    .await?;

    tracing::info!(siret = %siret, "Establishment edit link requested");

    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/establishments/{siret}/discussions
pub async fn list_discussions(
    principal: EstablishmentPrincipal,
    State(state): State<AppState>,
    Path(siret): Path<String>,
) -> AppResult<Json<DataResponse<Vec<Discussion>>>> {
    principal.ensure_siret(&siret)?;
    let establishment = find_establishment(&state, &siret).await?;
    let discussions = DiscussionRepo::list_for_establishment(&state.pool, establishment.id).await?;
    Ok(Json(DataResponse { data: discussions }))
}

/// GET /api/v1/search
///
/// Searchable establishments offering a job, by rome code or appellation.
pub async fn search(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> AppResult<Json<DataResponse<Vec<SearchResult>>>> {
    if filter.rome.is_none() && filter.appellation_code.is_none() {
        return Err(AppError::Core(CoreError::Validation(
            "Either rome or appellation_code is required".into(),
        )));
    }
    if let Some(rome) = &filter.rome {
        validate_rome_code(rome)?;
    }
    if let Some(code) = &filter.appellation_code {
        validate_appellation_code(code)?;
    }

    let contacts_since = Utc::now() - Duration::days(CONTACT_CAP_WINDOW_DAYS);
    let results =
        EstablishmentRepo::search(&state.pool, &filter, contacts_since, clamp_limit(filter.limit))
            .await?;
    Ok(Json(DataResponse { data: results }))
}

/// POST /api/v1/contact-establishment
///
/// A candidate asks to be put in touch with an establishment about one of
/// its offers. While the establishment has received `max_contacts_per_week`
/// requests over the last seven days it is hidden from search and refuses
/// new ones.
pub async fn contact(
    State(state): State<AppState>,
    Json(mut request): Json<ContactRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Discussion>>)> {
    request.potential_beneficiary_email = request.potential_beneficiary_email.trim().to_lowercase();

    let mut tx = state.pool.begin().await?;
    let establishment = EstablishmentRepo::lock_by_siret(&mut tx, &request.siret)
        .await?
        .ok_or_else(|| not_found(&request.siret))?;
    validate_contact_request(&mut request, establishment.business_contact.contact_mode)?;

    EstablishmentRepo::find_offer(&mut *tx, establishment.id, &request.appellation_code)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFoundByKey {
                entity: "Offer",
                key: format!("{} at {}", request.appellation_code, request.siret),
            })
        })?;

    let now = Utc::now();
    let window_start = now - Duration::days(CONTACT_CAP_WINDOW_DAYS);
    let contacts_in_window = DiscussionRepo::count_since(&mut *tx, establishment.id, window_start).await?;
    if !establishment.is_searchable
        || weekly_cap_reached(contacts_in_window, establishment.max_contacts_per_week)
    {
        return Err(AppError::Core(CoreError::Conflict(
            "This establishment is not taking contact requests at the moment".into(),
        )));
    }

    let already_contacted = DiscussionRepo::exists_since(
        &mut *tx,
        &request.siret,
        &request.appellation_code,
        &request.potential_beneficiary_email,
        now - Duration::days(CONTACT_COOLDOWN_DAYS),
    )
    .await?;
    if already_contacted {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "You already contacted this establishment for this offer in the last {CONTACT_COOLDOWN_DAYS} days"
        ))));
    }

    let discussion = DiscussionRepo::create(
        &mut *tx,
        &CreateDiscussion {
            establishment_id: establishment.id,
            request: &request,
        },
    )
    .await?;

    if weekly_cap_reached(contacts_in_window + 1, establishment.max_contacts_per_week) {
        tracing::info!(
            siret = %establishment.siret,
            max_contacts_per_week = establishment.max_contacts_per_week,
            "Weekly contact cap reached, establishment hidden from search",
        );
    }

    OutboxRepo::save(
        &mut *tx,
        Topic::ContactRequestedByBeneficiary,
        &json!({ "discussion_id": discussion.id, "siret": establishment.siret }),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        discussion_id = discussion.id,
        siret = %establishment.siret,
        "Contact request recorded",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: discussion })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn check_registry(state: &AppState, siret: &str) -> AppResult<()> {
    match state.siret_gateway.get_establishment(siret).await {
        Ok(Some(found)) if found.is_open => Ok(()),
        Ok(Some(_)) => Err(AppError::Core(CoreError::Validation(format!(
            "Establishment {siret} is closed according to the business registry"
        )))),
        Ok(None) => Err(AppError::Core(CoreError::Validation(format!(
            "Siret {siret} is unknown to the business registry"
        )))),
        Err(e) => {
            tracing::warn!(siret, error = %e, "Business registry unavailable, siret not checked");
            Ok(())
        }
    }
}

async fn find_establishment(state: &AppState, siret: &str) -> AppResult<Establishment> {
    EstablishmentRepo::find_by_siret(&state.pool, siret)
        .await?
        .ok_or_else(|| not_found(siret))
}

fn not_found(siret: &str) -> AppError {
    AppError::Core(CoreError::NotFoundByKey {
        entity: "Establishment",
        key: siret.to_string(),
    })
}

