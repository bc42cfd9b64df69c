//! Outbox dispatch through the notification subscriber, with in-memory
//! email and SMS gateways.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    create_active_agency, establishment_form, post_json, submit_convention,
    test_config, OPEN_SIRET,
};
use immersion_api::notifications::NotificationDispatcher;
use immersion_core::events::Topic;
use immersion_db::repositories::OutboxRepo;
use immersion_events::{
    BatchReport, EventBus, InMemoryEmailGateway, InMemorySmsGateway, MonitoringNotifier,
    OutboxConfig, OutboxCrawler,
};
use serde_json::json;
use sqlx::PgPool;

struct Harness {
    crawler: OutboxCrawler,
    bus: Arc<EventBus>,
    email: Arc<InMemoryEmailGateway>,
    sms: Arc<InMemorySmsGateway>,
}

fn harness(pool: &PgPool) -> Harness {
    let config = test_config();
    let email = Arc::new(InMemoryEmailGateway::new());
    let sms = Arc::new(InMemorySmsGateway::new());
    let bus = Arc::new(EventBus::default());
    let dispatcher = NotificationDispatcher::new(
        pool.clone(),
        email.clone(),
        sms.clone(),
        config.magic_link.clone(),
        config.frontend_base_url.clone(),
    );
    let crawler = OutboxCrawler::new(
        pool.clone(),
        bus.clone(),
        OutboxConfig::default(),
        MonitoringNotifier::new(None),
    )
    .with_subscriber(Arc::new(dispatcher));

    Harness {
        crawler,
        bus,
        email,
        sms,
    }
}

async fn notification_rows(pool: &PgPool) -> Vec<(String, String, String)> {
    sqlx::query_as("SELECT kind, recipient, state FROM notifications ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn outbox_statuses(pool: &PgPool) -> Vec<String> {
    sqlx::query_scalar("SELECT status FROM outbox ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn submitted_convention_asks_signatories_to_sign(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    let id = submit_convention(&pool, agency.id).await["id"].as_i64().unwrap();
    let h = harness(&pool);
    let mut events = h.bus.subscribe();

    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(
        report,
        BatchReport {
            published: 1,
            failed: 0,
            quarantined: 0
        }
    );

    let emails = h.email.sent();
    let mut recipients: Vec<&str> = emails.iter().map(|e| e.to[0].as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["jeanne@mail.fr", "paul@boulangerie.fr"]);
    assert!(emails
        .iter()
        .all(|e| e.body.contains("http://localhost:5173/convention/sign?jwt=")));

    // Only the beneficiary has a mobile number.
    let sms = h.sms.sent();
    assert_eq!(sms.len(), 1);
    assert_eq!(sms[0].phone, "0612345678");

    assert_eq!(notification_rows(&pool).await.len(), 3);
    assert_eq!(outbox_statuses(&pool).await, vec!["published"]);

    let event = events.try_recv().expect("published event should be broadcast");
    assert_eq!(event.topic, Topic::ConventionSubmitted);
    assert_eq!(event.payload_id("convention_id"), Some(id));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn retried_event_does_not_notify_twice(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    submit_convention(&pool, agency.id).await;
    let h = harness(&pool);

    h.email.set_failing(true);
    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(outbox_statuses(&pool).await, vec!["failed"]);
    assert_eq!(h.sms.sent().len(), 1);

    let failed = notification_rows(&pool)
        .await
        .into_iter()
        .filter(|(_, _, state)| state == "failed")
        .count();
    assert_eq!(failed, 2);

    h.email.set_failing(false);
    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(outbox_statuses(&pool).await, vec!["published"]);
    assert_eq!(h.email.sent().len(), 2);
    assert_eq!(h.sms.sent().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn event_is_quarantined_after_max_attempts(pool: PgPool) {
    let agency = create_active_agency(&pool, "Agence de Paris").await;
    submit_convention(&pool, agency.id).await;
    let h = harness(&pool);
    h.email.set_failing(true);

    let max_attempts = OutboxConfig::default().max_attempts;
    for _ in 1..max_attempts {
        assert_eq!(h.crawler.process_batch().await.unwrap().failed, 1);
    }
    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(report.quarantined, 1);
    assert_eq!(outbox_statuses(&pool).await, vec!["quarantined"]);

    assert!(h.crawler.process_batch().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_topic_and_missing_entity(pool: PgPool) {
    sqlx::query("INSERT INTO outbox (topic, payload) VALUES ('LegacyTopic', '{}')")
        .execute(&pool)
        .await
        .unwrap();
    OutboxRepo::save(&pool, Topic::ConventionSubmitted, &json!({ "convention_id": 999_999 }))
        .await
        .unwrap();
    let h = harness(&pool);

    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(
        report,
        BatchReport {
            published: 1,
            failed: 0,
            quarantined: 1
        }
    );
    assert_eq!(outbox_statuses(&pool).await, vec!["quarantined", "published"]);
    assert!(h.email.sent().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn email_contact_request_reaches_the_establishment(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/establishments", establishment_form("EMAIL")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let app = common::build_test_app(pool.clone());
    let response = post_json(
        app,
        "/api/v1/contact-establishment",
        json!({
            "siret": OPEN_SIRET,
            "appellation_code": "11573",
            "contact_mode": "EMAIL",
            "potential_beneficiary_first_name": "Jeanne",
            "potential_beneficiary_last_name": "Dupont",
            "potential_beneficiary_email": "jeanne@mail.fr",
            "message": "Bonjour, je souhaiterais découvrir votre métier."
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let h = harness(&pool);
    let report = h.crawler.process_batch().await.unwrap();
    assert_eq!(report.published, 2);

    let emails = h.email.sent();
    let contact = emails
        .iter()
        .find(|e| e.reply_to.is_some())
        .expect("contact request email");
    assert_eq!(contact.to, vec!["paul@boulangerie.fr".to_string()]);
    assert_eq!(contact.reply_to.as_deref(), Some("jeanne@mail.fr"));
    assert!(contact.body.contains("Boulanger / Boulangère"));
}
