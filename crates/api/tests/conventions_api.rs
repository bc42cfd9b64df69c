//! HTTP-level integration tests for the convention lifecycle: submission,
//! magic-link access, signatures, review and link renewal.

mod common;

use axum::http::StatusCode;
use common::{
    access_token, activate, body_json, convention_form, convention_token, create_active_agency,
    create_agency, create_back_office, create_user, get, get_auth, grant_right, post_json,
    post_json_auth, put_json_auth, sign_all, submit_convention, test_config,
};
use immersion_api::auth::magic_link::{generate_convention_jwt, MagicLinkConfig};
use immersion_core::roles::Role;
use immersion_core::types::DbId;
use immersion_db::models::agency_right::AgencyRightInput;
use immersion_db::repositories::AgencyRightRepo;
use serde_json::{json, Value};
use sqlx::PgPool;

const VALIDATOR: &str = "validator@agence.fr";

async fn outbox_topics(pool: &PgPool) -> Vec<String> {
    sqlx::query_scalar("SELECT topic FROM outbox ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn change_status(pool: &PgPool, id: DbId, token: &str, body: Value) -> axum::response::Response {
    let app = common::build_test_app(pool.clone());
    post_json_auth(app, &format!("/api/v1/conventions/{id}/status"), body, token).await
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn submitted_convention_is_ready_to_sign(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;

    let convention = submit_convention(&pool, agency.id).await;

    assert_eq!(convention["status"], "READY_TO_SIGN");
    assert_eq!(convention["signatories"]["beneficiary"]["phone"], "0612345678");
    assert!(convention["signatories"]["beneficiary"]["signed_at"].is_null());
    assert_eq!(outbox_topics(&pool).await, vec!["ConventionSubmitted"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn submission_to_inactive_agency_is_rejected(pool: PgPool) {
    let agency = create_agency(&pool, "Agence en attente", &[], &[VALIDATOR], None).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/conventions", convention_form(agency.id)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(outbox_topics(&pool).await.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn invalid_form_is_rejected(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let mut form = convention_form(agency.id);
    form["date_end"] = form["date_start"].clone();

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/conventions", form).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn magic_link_must_match_a_party(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/conventions/{id}");

    let app = common::build_test_app(pool.clone());
    assert_eq!(get(app, &uri).await.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool.clone());
    let token = convention_token(id, Role::Beneficiary, "jeanne@mail.fr");
    assert_eq!(get_auth(app, &uri, &token).await.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let token = convention_token(id, Role::Beneficiary, "someone@else.fr");
    assert_eq!(get_auth(app, &uri, &token).await.status(), StatusCode::FORBIDDEN);

    let app = common::build_test_app(pool);
    let token = convention_token(id + 1, Role::Beneficiary, "jeanne@mail.fr");
    assert_eq!(get_auth(app, &uri, &token).await.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn connected_user_needs_a_granted_right(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/conventions/{id}");
    let user = create_user(&pool, "staff@agence.fr", false).await;

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &access_token(&user)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_right(&pool, user.id, agency.id, "to-review").await;
    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &access_token(&user)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    grant_right(&pool, user.id, agency.id, "agency-viewer").await;
    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &access_token(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/conventions", &access_token(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_right_falls_back_to_referred_agency(pool: PgPool) {
    let referred = create_active_agency(&pool, "Agence référente").await;
    let agency = create_agency(
        &pool,
        "Structure d'accompagnement",
        &["counsellor@structure.fr"],
        &[],
        Some(referred.id),
    )
    .await;
    activate(&pool, agency.id).await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();

    let user = create_user(&pool, "validator@agence.fr", false).await;
    let mut conn = pool.acquire().await.unwrap();
    AgencyRightRepo::replace_for_user(
        &mut conn,
        user.id,
        &[
            AgencyRightInput {
                agency_id: agency.id,
                role: "to-review".into(),
                is_notified_by_email: false,
            },
            AgencyRightInput {
                agency_id: referred.id,
                role: "validator".into(),
                is_notified_by_email: true,
            },
        ],
    )
    .await
    .unwrap();

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/conventions/{id}"), &access_token(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_convention_returns_404(pool: PgPool) {
    let admin = create_back_office(&pool).await;
    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/conventions/9999", &access_token(&admin)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn signatures_move_the_convention_to_review(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/conventions/{id}/sign");

    let beneficiary = convention_token(id, Role::Beneficiary, "jeanne@mail.fr");
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, json!({}), &beneficiary).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "PARTIALLY_SIGNED");
    assert!(json["data"]["signatories"]["beneficiary"]["signed_at"].is_string());

    // Signing twice conflicts.
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, json!({}), &beneficiary).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let representative =
        convention_token(id, Role::EstablishmentRepresentative, "paul@boulangerie.fr");
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, json!({}), &representative).await;
    assert_eq!(body_json(response).await["data"]["status"], "IN_REVIEW");

    assert_eq!(
        outbox_topics(&pool).await,
        vec![
            "ConventionSubmitted",
            "ConventionPartiallySigned",
            "ConventionFullySigned"
        ]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn tutor_and_connected_users_cannot_sign(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let uri = format!("/api/v1/conventions/{id}/sign");

    let tutor = convention_token(id, Role::EstablishmentTutor, "luc@boulangerie.fr");
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, json!({}), &tutor).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = create_back_office(&pool).await;
    let app = common::build_test_app(pool);
    let response = post_json_auth(app, &uri, json!({}), &access_token(&admin)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn validator_accepts_a_signed_convention(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;

    let token = convention_token(id, Role::Validator, VALIDATOR);
    let response = change_status(
        &pool,
        id,
        &token,
        json!({ "status": "ACCEPTED_BY_VALIDATOR" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ACCEPTED_BY_VALIDATOR");
    assert!(json["data"]["date_validation"].is_string());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn referred_agency_requires_counsellor_first(pool: PgPool) {
    let referred = create_active_agency(&pool, "Agence référente").await;
    let agency = create_agency(
        &pool,
        "Structure d'accompagnement",
        &["counsellor@structure.fr"],
        &[],
        Some(referred.id),
    )
    .await;
    activate(&pool, agency.id).await;

    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;

    let validator = convention_token(id, Role::Validator, VALIDATOR);
    let response = change_status(
        &pool,
        id,
        &validator,
        json!({ "status": "ACCEPTED_BY_VALIDATOR" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let counsellor = convention_token(id, Role::Counsellor, "counsellor@structure.fr");
    let response = change_status(
        &pool,
        id,
        &counsellor,
        json!({ "status": "ACCEPTED_BY_COUNSELLOR" }),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["status"], "ACCEPTED_BY_COUNSELLOR");

    let response = change_status(
        &pool,
        id,
        &validator,
        json!({ "status": "ACCEPTED_BY_VALIDATOR" }),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["status"], "ACCEPTED_BY_VALIDATOR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn rejection_needs_a_justification(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;
    let token = convention_token(id, Role::Validator, VALIDATOR);

    let response = change_status(
        &pool,
        id,
        &token,
        json!({ "status": "REJECTED", "justification": "   " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = change_status(
        &pool,
        id,
        &token,
        json!({ "status": "REJECTED", "justification": "Dates incompatibles" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "REJECTED");
    assert_eq!(json["data"]["status_justification"], "Dates incompatibles");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn signatories_cannot_review(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;

    let token = convention_token(id, Role::Beneficiary, "jeanne@mail.fr");
    let response = change_status(
        &pool,
        id,
        &token,
        json!({ "status": "ACCEPTED_BY_VALIDATOR" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = change_status(&pool, id, &token, json!({ "status": "IN_REVIEW" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn modification_request_clears_signatures_until_resubmission(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;

    let validator = convention_token(id, Role::Validator, VALIDATOR);
    let response = change_status(
        &pool,
        id,
        &validator,
        json!({ "status": "DRAFT", "justification": "Horaires à préciser" }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "DRAFT");
    assert!(json["data"]["signatories"]["beneficiary"]["signed_at"].is_null());

    let mut form = convention_form(agency.id);
    form["immersion_objective"] = json!("Confirmer un projet professionnel");
    let beneficiary = convention_token(id, Role::Beneficiary, "jeanne@mail.fr");
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &format!("/api/v1/conventions/{id}"), form, &beneficiary).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "READY_TO_SIGN");
    assert_eq!(json["data"]["immersion_objective"], "Confirmer un projet professionnel");

    let topics = outbox_topics(&pool).await;
    assert_eq!(
        &topics[topics.len() - 2..],
        &["ConventionRequiresModification", "ConventionSubmitted"]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn back_office_can_cancel_a_validated_convention(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    sign_all(&pool, id).await;
    let admin = access_token(&create_back_office(&pool).await);

    let response = change_status(&pool, id, &admin, json!({ "status": "ACCEPTED_BY_VALIDATOR" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = change_status(
        &pool,
        id,
        &admin,
        json!({ "status": "CANCELLED", "justification": "Désistement du bénéficiaire" }),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["status"], "CANCELLED");
}

// ---------------------------------------------------------------------------
// Magic link renewal
// ---------------------------------------------------------------------------

fn expired_token(convention_id: DbId, role: Role, email: &str) -> String {
    let config = MagicLinkConfig {
        convention_expiry_days: -1,
        ..test_config().magic_link
    };
    generate_convention_jwt(convention_id, role, email, &config).unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_link_is_refused_but_can_be_renewed(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let expired = expired_token(id, Role::Beneficiary, "jeanne@mail.fr");

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &format!("/api/v1/conventions/{id}"), &expired).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/conventions/magic-link/renew",
        json!({ "expired_jwt": expired }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(outbox_topics(&pool).await.last().unwrap(), "MagicLinkRenewalRequested");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn renewal_refuses_garbage_and_strangers(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/conventions/magic-link/renew",
        json!({ "expired_jwt": "not-a-jwt" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/conventions/magic-link/renew",
        json!({ "expired_jwt": expired_token(id, Role::Beneficiary, "intruder@mail.fr") }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
