//! Shared helpers for the API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use immersion_api::auth::magic_link::{
    generate_convention_jwt, generate_establishment_jwt, MagicLinkConfig,
};
use immersion_api::auth::password::hash_password;
use immersion_api::auth::session::{issue_access_token, AccessRole, SessionConfig};
use immersion_api::config::ServerConfig;
use immersion_api::router::build_app_router;
use immersion_api::state::AppState;
use immersion_core::agency::AgencyStatus;
use immersion_core::roles::Role;
use immersion_core::types::DbId;
use immersion_db::models::agency::{Agency, CreateAgency};
use immersion_db::models::agency_right::AgencyRightInput;
use immersion_db::models::user::{CreateUser, User};
use immersion_db::repositories::{AgencyRepo, AgencyRightRepo, UserRepo};
use immersion_events::{OfflineSiretGateway, SiretEstablishment};

/// Password of every user created by [`create_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Siret the test registry knows as open.
pub const OPEN_SIRET: &str = "12345678901234";

/// Siret the test registry knows as closed.
pub const CLOSED_SIRET: &str = "98765432109876";

/// Build a test `ServerConfig` with fixed secrets.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        frontend_base_url: "http://localhost:5173".to_string(),
        session: SessionConfig {
            secret: "test-jwt-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        magic_link: MagicLinkConfig {
            secret: "test-magic-link-secret".to_string(),
            convention_expiry_days: 30,
            establishment_expiry_days: 2,
        },
    }
}

/// The business registry stand-in used by every test app.
pub fn test_registry() -> OfflineSiretGateway {
    OfflineSiretGateway::with_known([
        SiretEstablishment {
            siret: OPEN_SIRET.to_string(),
            business_name: "BOULANGERIE MARTIN".to_string(),
            business_address: "1 RUE DU PAIN 75001 PARIS".to_string(),
            naf_code: Some("1071C".to_string()),
            is_open: true,
        },
        SiretEstablishment {
            siret: CLOSED_SIRET.to_string(),
            business_name: "ANCIENNE FABRIQUE".to_string(),
            business_address: "2 RUE FERMEE 69001 LYON".to_string(),
            naf_code: None,
            is_open: false,
        },
    ])
}

/// Build the full application router on `pool`, with the production
/// middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        siret_gateway: Arc::new(test_registry()),
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    app.oneshot(request).await.expect("request should succeed")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, Some(token)).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), None).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(body), Some(token)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body), None).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body), Some(token)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None, Some(token)).await
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn access_token(user: &User) -> String {
    let role = AccessRole::for_user(user.is_back_office);
    issue_access_token(user.id, role, &test_config().session).expect("token should sign")
}

pub fn convention_token(convention_id: DbId, role: Role, email: &str) -> String {
    generate_convention_jwt(convention_id, role, email, &test_config().magic_link)
        .expect("magic link should sign")
}

pub fn establishment_token(siret: &str) -> String {
    generate_establishment_jwt(siret, &test_config().magic_link).expect("magic link should sign")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_user(pool: &PgPool, email: &str, is_back_office: bool) -> User {
    let input = CreateUser {
        email: email.to_string(),
        first_name: "Camille".to_string(),
        last_name: "Durand".to_string(),
        password_hash: hash_password(TEST_PASSWORD).expect("hashing should succeed"),
        is_back_office,
    };
    UserRepo::create(pool, &input)
        .await
        .expect("user creation should succeed")
}

pub async fn create_back_office(pool: &PgPool) -> User {
    create_user(pool, "admin@immersion.fr", true).await
}

/// Insert an agency in `needsReview`.
pub async fn create_agency(
    pool: &PgPool,
    name: &str,
    counsellors: &[&str],
    validators: &[&str],
    refers_to_agency_id: Option<DbId>,
) -> Agency {
    let input = CreateAgency {
        name: name.to_string(),
        kind: "pole-emploi".to_string(),
        address: "10 rue de la Paix".to_string(),
        postcode: "75002".to_string(),
        department_code: "75".to_string(),
        city: "Paris".to_string(),
        agency_siret: None,
        counsellor_emails: counsellors.iter().map(|e| e.to_string()).collect(),
        validator_emails: validators.iter().map(|e| e.to_string()).collect(),
        refers_to_agency_id,
    };
    AgencyRepo::create(pool, &input)
        .await
        .expect("agency creation should succeed")
}

/// Insert an active agency validated by `validator@agence.fr`.
pub async fn create_active_agency(pool: &PgPool, name: &str) -> Agency {
    let agency = create_agency(pool, name, &[], &["validator@agence.fr"], None).await;
    activate(pool, agency.id).await
}

pub async fn activate(pool: &PgPool, agency_id: DbId) -> Agency {
    AgencyRepo::update_status(pool, agency_id, AgencyStatus::Active, None)
        .await
        .expect("status update should succeed")
        .expect("agency should exist")
}

pub async fn grant_right(pool: &PgPool, user_id: DbId, agency_id: DbId, role: &str) {
    let mut conn = pool.acquire().await.expect("connection");
    AgencyRightRepo::replace_for_user(
        &mut conn,
        user_id,
        &[AgencyRightInput {
            agency_id,
            role: role.to_string(),
            is_notified_by_email: true,
        }],
    )
    .await
    .expect("rights should be saved");
}

/// A valid convention form for a one-week immersion starting next week.
pub fn convention_form(agency_id: DbId) -> Value {
    let start = Utc::now().date_naive() + Duration::days(7);
    let end = start + Duration::days(4);
    let working_days: Vec<Value> = (0..5)
        .map(|offset| json!({ "date": start + Duration::days(offset), "hours": 7.0 }))
        .collect();

    json!({
        "agency_id": agency_id,
        "internship_kind": "immersion",
        "date_start": start,
        "date_end": end,
        "schedule": { "working_days": working_days },
        "siret": OPEN_SIRET,
        "business_name": "Boulangerie Martin",
        "immersion_address": "1 rue du Pain 75001 Paris",
        "immersion_objective": "Découvrir un métier",
        "immersion_appellation": {
            "appellation_code": "11573",
            "appellation_label": "Boulanger / Boulangère",
            "rome_code": "D1102"
        },
        "immersion_activities": "Pétrissage, façonnage",
        "individual_protection": true,
        "sanitary_prevention": false,
        "signatories": {
            "beneficiary": {
                "first_name": "Jeanne",
                "last_name": "Dupont",
                "email": "jeanne@mail.fr",
                "phone": "06 12 34 56 78",
                "birthdate": "1995-05-20"
            },
            "establishment_representative": {
                "first_name": "Paul",
                "last_name": "Martin",
                "email": "paul@boulangerie.fr",
                "phone": "0102030405"
            }
        },
        "establishment_tutor": {
            "first_name": "Luc",
            "last_name": "Martin",
            "email": "luc@boulangerie.fr",
            "phone": "0102030406",
            "job": "Chef boulanger"
        }
    })
}

/// Submit [`convention_form`] through the API and return the created row.
pub async fn submit_convention(pool: &PgPool, agency_id: DbId) -> Value {
    let app = build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/conventions", convention_form(agency_id)).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Sign `convention_id` as each of the two signatories of [`convention_form`].
pub async fn sign_all(pool: &PgPool, convention_id: DbId) -> Value {
    let mut last = Value::Null;
    for (role, email) in [
        (Role::Beneficiary, "jeanne@mail.fr"),
        (Role::EstablishmentRepresentative, "paul@boulangerie.fr"),
    ] {
        let token = convention_token(convention_id, role, email);
        let app = build_test_app(pool.clone());
        let response = post_json_auth(
            app,
            &format!("/api/v1/conventions/{convention_id}/sign"),
            json!({}),
            &token,
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        last = body_json(response).await["data"].clone();
    }
    last
}

/// A valid establishment form for [`OPEN_SIRET`].
pub fn establishment_form(contact_mode: &str) -> Value {
    json!({
        "siret": OPEN_SIRET,
        "business_name": "Boulangerie Martin",
        "street_address": "1 rue du Pain",
        "postcode": "75001",
        "city": "Paris",
        "naf_code": "1071C",
        "business_contact": {
            "first_name": "Paul",
            "last_name": "Martin",
            "email": "paul@boulangerie.fr",
            "phone": "01 02 03 04 05",
            "job": "Gérant",
            "contact_mode": contact_mode
        },
        "offers": [{
            "appellation_code": "11573",
            "appellation_label": "Boulanger / Boulangère",
            "rome_code": "D1102"
        }],
        "max_contacts_per_week": 2
    })
}
