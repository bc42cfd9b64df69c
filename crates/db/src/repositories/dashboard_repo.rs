//! Aggregate queries behind the back-office dashboard.

use sqlx::PgPool;

use crate::models::dashboard::{DashboardStats, StatusCount};
use crate::repositories::OutboxRepo;

pub struct DashboardRepo;

impl DashboardRepo {
    pub async fn stats(pool: &PgPool) -> Result<DashboardStats, sqlx::Error> {
        let conventions_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM conventions GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;

        let agencies_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM agencies GROUP BY status ORDER BY status",
        )
        .fetch_all(pool)
        .await?;

        let (establishments_total, searchable_establishments_total): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_searchable) FROM establishments",
        )
        .fetch_one(pool)
        .await?;

        let discussions_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discussions")
            .fetch_one(pool)
            .await?;

        let assessments_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assessments")
            .fetch_one(pool)
            .await?;

        let pending_outbox_events = OutboxRepo::count_backlog(pool).await?;

        Ok(DashboardStats {
            conventions_by_status,
            agencies_by_status,
            establishments_total,
            searchable_establishments_total,
            discussions_total,
            assessments_total,
            pending_outbox_events,
        })
    }
}
