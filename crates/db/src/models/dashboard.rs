//! Aggregated counts for the back-office dashboard.

use serde::Serialize;
use sqlx::FromRow;

/// Number of rows sharing a status value.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub conventions_by_status: Vec<StatusCount>,
    pub agencies_by_status: Vec<StatusCount>,
    pub establishments_total: i64,
    pub searchable_establishments_total: i64,
    pub discussions_total: i64,
    pub assessments_total: i64,
    pub pending_outbox_events: i64,
}
