//! Repository for the `notifications` table.

use immersion_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::notification::{CreateNotification, Notification, STATE_SENT};

/// Column list for `notifications` queries.
const COLUMNS: &str =
    "id, outbox_id, kind, topic, recipient, subject, body, state, error, created_at, updated_at";

/// Records every email and SMS the platform sent or tried to send.
pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn record(
        executor: impl PgExecutor<'_>,
        input: &CreateNotification,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (outbox_id, kind, topic, recipient, subject, body, state, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(input.outbox_id)
            .bind(input.kind)
            .bind(&input.topic)
            .bind(&input.recipient)
            .bind(&input.subject)
            .bind(&input.body)
            .bind(input.state)
            .bind(&input.error)
            .fetch_one(executor)
            .await
    }

    /// Latest notifications, optionally restricted to one kind.
    pub async fn list_latest(
        executor: impl PgExecutor<'_>,
        kind: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications
             WHERE ($1::TEXT IS NULL OR kind = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(kind)
            .bind(limit)
            .fetch_all(executor)
            .await
    }

    /// `(kind, recipient)` pairs already delivered for an outbox event, so a
    /// retried event does not notify the same person twice.
    pub async fn sent_recipients(
        executor: impl PgExecutor<'_>,
        outbox_id: DbId,
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT kind, recipient FROM notifications
             WHERE outbox_id = $1 AND state = $2",
        )
        .bind(outbox_id)
        .bind(STATE_SENT)
        .fetch_all(executor)
        .await
    }
}
