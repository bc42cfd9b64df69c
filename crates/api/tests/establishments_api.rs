//! HTTP-level integration tests for host establishments, search and contact
//! requests.

mod common;

use axum::http::StatusCode;
use common::{
    access_token, body_json, create_back_office, create_user, delete_auth, establishment_form,
    establishment_token, get, get_auth, post_json, put_json, put_json_auth, CLOSED_SIRET,
    OPEN_SIRET,
};
use serde_json::{json, Value};
use sqlx::PgPool;

async fn register(pool: &PgPool, contact_mode: &str) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/establishments", establishment_form(contact_mode)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

fn contact_request(email: &str) -> Value {
    json!({
        "siret": OPEN_SIRET,
        "appellation_code": "11573",
        "contact_mode": "EMAIL",
        "potential_beneficiary_first_name": "Jeanne",
        "potential_beneficiary_last_name": "Dupont",
        "potential_beneficiary_email": email,
        "message": "Bonjour, je souhaiterais découvrir le métier de boulanger."
    })
}

async fn search_hits(pool: &PgPool) -> usize {
    let app = common::build_test_app(pool.clone());
    let response = get(app, "/api/v1/search?appellation_code=11573").await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].as_array().unwrap().len()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn register_establishment_with_offers(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/establishments", establishment_form("EMAIL")).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["siret"], OPEN_SIRET);
    assert_eq!(json["data"]["department_code"], "75");
    assert_eq!(json["data"]["business_contact"]["phone"], "0102030405");
    assert_eq!(json["data"]["is_searchable"], true);
    assert_eq!(json["data"]["offers"].as_array().unwrap().len(), 1);

    let topic: String = sqlx::query_scalar("SELECT topic FROM outbox")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(topic, "FormEstablishmentAdded");

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/establishments", establishment_form("EMAIL")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn registry_rejects_closed_and_unknown_sirets(pool: PgPool) {
    for siret in [CLOSED_SIRET, "11111111111111"] {
        let mut form = establishment_form("EMAIL");
        form["siret"] = json!(siret);
        let app = common::build_test_app(pool.clone());
        let response = post_json(app, "/api/v1/establishments", form).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "siret {siret}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn edit_link_grants_access_to_its_siret_only(pool: PgPool) {
    register(&pool, "EMAIL").await;
    let uri = format!("/api/v1/establishments/{OPEN_SIRET}");

    let app = common::build_test_app(pool.clone());
    let response = get(app, &uri).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &establishment_token(OPEN_SIRET)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &establishment_token(CLOSED_SIRET)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let app = common::build_test_app(pool);
    let response = post_json(app, &format!("{uri}/edit-link"), json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_replaces_offers(pool: PgPool) {
    register(&pool, "EMAIL").await;
    let uri = format!("/api/v1/establishments/{OPEN_SIRET}");
    let token = establishment_token(OPEN_SIRET);

    let mut form = establishment_form("PHONE");
    form["offers"] = json!([{
        "appellation_code": "12694",
        "appellation_label": "Pâtissier / Pâtissière",
        "rome_code": "D1104"
    }]);

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &uri, form.clone(), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["business_contact"]["contact_mode"], "PHONE");
    assert_eq!(json["data"]["offers"][0]["appellation_code"], "12694");
    assert_eq!(search_hits(&pool).await, 0);

    form["siret"] = json!(CLOSED_SIRET);
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &uri, form.clone(), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool);
    let response = put_json(app, &uri, form).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn only_back_office_deletes(pool: PgPool) {
    register(&pool, "EMAIL").await;
    let uri = format!("/api/v1/establishments/{OPEN_SIRET}");

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &establishment_token(OPEN_SIRET)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let user = access_token(&create_user(&pool, "camille@mail.fr", false).await);
    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &user).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = access_token(&create_back_office(&pool).await);
    let app = common::build_test_app(pool.clone());
    let response = delete_auth(app, &uri, &admin).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let app = common::build_test_app(pool);
    let response = delete_auth(app, &uri, &admin).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn search_requires_a_job_criterion(pool: PgPool) {
    register(&pool, "EMAIL").await;

    let app = common::build_test_app(pool.clone());
    let response = get(app, "/api/v1/search").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool.clone());
    let response = get(app, "/api/v1/search?rome=D1102&department=75").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["siret"], OPEN_SIRET);
    assert!(json["data"][0].get("business_contact").is_none());

    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/search?rome=D1102&department=69").await;
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn contact_request_is_recorded_once_per_week(pool: PgPool) {
    register(&pool, "EMAIL").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/contact-establishment", contact_request("Jeanne@Mail.fr")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "PENDING");
    assert_eq!(json["data"]["potential_beneficiary_email"], "jeanne@mail.fr");

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/contact-establishment", contact_request("jeanne@mail.fr")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(
        app,
        &format!("/api/v1/establishments/{OPEN_SIRET}/discussions"),
        &establishment_token(OPEN_SIRET),
    )
    .await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

    let topics: Vec<String> = sqlx::query_scalar("SELECT topic FROM outbox ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(topics, vec!["FormEstablishmentAdded", "ContactRequestedByBeneficiary"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn weekly_cap_hides_establishment_from_search(pool: PgPool) {
    register(&pool, "EMAIL").await;
    assert_eq!(search_hits(&pool).await, 1);

    for email in ["jeanne@mail.fr", "marc@mail.fr"] {
        let app = common::build_test_app(pool.clone());
        let response = post_json(app, "/api/v1/contact-establishment", contact_request(email)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    assert_eq!(search_hits(&pool).await, 0);

    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/contact-establishment", contact_request("lea@mail.fr")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn weekly_cap_lifts_once_contacts_age_out(pool: PgPool) {
    register(&pool, "EMAIL").await;
    for email in ["jeanne@mail.fr", "marc@mail.fr"] {
        let app = common::build_test_app(pool.clone());
        let response = post_json(app, "/api/v1/contact-establishment", contact_request(email)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    assert_eq!(search_hits(&pool).await, 0);

    sqlx::query("UPDATE discussions SET created_at = created_at - INTERVAL '8 days'")
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(search_hits(&pool).await, 1);
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/contact-establishment", contact_request("lea@mail.fr")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_contacts_respect_weekly_cap(pool: PgPool) {
    register(&pool, "EMAIL").await;

    let mut requests = tokio::task::JoinSet::new();
    for i in 0..6 {
        let app = common::build_test_app(pool.clone());
        let body = contact_request(&format!("candidate{i}@mail.fr"));
        requests.spawn(async move {
            post_json(app, "/api/v1/contact-establishment", body).await.status()
        });
    }
    let mut created = 0;
    while let Some(status) = requests.join_next().await {
        let status = status.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::CONFLICT);
        }
    }
    assert_eq!(created, 2);

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discussions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn contact_request_must_match_establishment(pool: PgPool) {
    register(&pool, "PHONE").await;

    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/contact-establishment", contact_request("jeanne@mail.fr")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut request = contact_request("jeanne@mail.fr");
    request["contact_mode"] = json!("PHONE");
    request["appellation_code"] = json!("12694");
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/contact-establishment", request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut request = contact_request("jeanne@mail.fr");
    request["siret"] = json!("11111111111111");
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/contact-establishment", request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
