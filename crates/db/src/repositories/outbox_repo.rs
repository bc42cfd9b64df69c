//! Repository for the `outbox` table.

use immersion_core::events::Topic;
use immersion_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::outbox::{
    OutboxEvent, OUTBOX_FAILED, OUTBOX_PENDING, OUTBOX_PUBLISHED, OUTBOX_QUARANTINED,
};

const COLUMNS: &str = "id, topic, payload, status, attempts, last_error, occurred_at, \
                       published_at, created_at, updated_at";

/// Durable queue of domain events, written in the same transaction as the
/// change that raised them.
pub struct OutboxRepo;

impl OutboxRepo {
    /// Append an event, returning its id.
    pub async fn save(
        executor: impl PgExecutor<'_>,
        topic: Topic,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar("INSERT INTO outbox (topic, payload) VALUES ($1, $2) RETURNING id")
            .bind(topic.as_str())
            .bind(payload)
            .fetch_one(executor)
            .await
    }

    /// Lock up to `batch` events awaiting dispatch, oldest first.
    ///
    /// Rows locked by another crawler are skipped; the lock only lasts when
    /// called inside a transaction. `NO KEY UPDATE` still lets subscribers
    /// insert `notifications` rows referencing the locked event.
    pub async fn fetch_unpublished(
        executor: impl PgExecutor<'_>,
        batch: i64,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outbox
             WHERE status IN ($1, $2)
             ORDER BY occurred_at, id
             LIMIT $3
             FOR NO KEY UPDATE SKIP LOCKED"
        );
        sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(OUTBOX_PENDING)
            .bind(OUTBOX_FAILED)
            .bind(batch)
            .fetch_all(executor)
            .await
    }

    pub async fn mark_published(executor: impl PgExecutor<'_>, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE outbox SET status = $2, published_at = NOW(), attempts = attempts + 1,
                               last_error = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(OUTBOX_PUBLISHED)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Count a failed attempt. The event is quarantined once `attempts`
    /// reaches `max_attempts`. Returns the new status.
    pub async fn mark_failed(
        executor: impl PgExecutor<'_>,
        id: DbId,
        error: &str,
        max_attempts: i32,
    ) -> Result<String, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE outbox SET
                attempts = attempts + 1,
                last_error = $2,
                status = CASE WHEN attempts + 1 >= $3 THEN $4 ELSE $5 END
             WHERE id = $1
             RETURNING status",
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .bind(OUTBOX_QUARANTINED)
        .bind(OUTBOX_FAILED)
        .fetch_one(executor)
        .await
    }

    /// Events still waiting to be dispatched, failed ones included.
    pub async fn count_backlog(executor: impl PgExecutor<'_>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE status IN ($1, $2)")
            .bind(OUTBOX_PENDING)
            .bind(OUTBOX_FAILED)
            .fetch_one(executor)
            .await
    }

    /// Failed and quarantined events, most recent first.
    pub async fn list_failed(
        executor: impl PgExecutor<'_>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM outbox
             WHERE status IN ($1, $2)
             ORDER BY updated_at DESC, id DESC
             LIMIT $3"
        );
        sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(OUTBOX_FAILED)
            .bind(OUTBOX_QUARANTINED)
            .bind(limit)
            .fetch_all(executor)
            .await
    }

    pub async fn find_by_id(
        executor: impl PgExecutor<'_>,
        id: DbId,
    ) -> Result<Option<OutboxEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outbox WHERE id = $1");
        sqlx::query_as::<_, OutboxEvent>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
