//! Outbox event rows.

use immersion_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Waiting for its first dispatch.
pub const OUTBOX_PENDING: &str = "pending";
/// Delivered to every subscriber.
pub const OUTBOX_PUBLISHED: &str = "published";
/// A subscriber failed; retried on the next crawl.
pub const OUTBOX_FAILED: &str = "failed";
/// Gave up after the maximum number of attempts.
pub const OUTBOX_QUARANTINED: &str = "quarantined";

/// A row from the `outbox` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OutboxEvent {
    pub id: DbId,
    pub topic: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub occurred_at: Timestamp,
    pub published_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
