//! Assessment entity model.

use immersion_core::types::{Date, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `assessments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Assessment {
    pub id: DbId,
    pub convention_id: DbId,
    pub status: String,
    pub establishment_feedback: String,
    pub last_day_of_presence: Option<Date>,
    pub number_of_missed_hours: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
