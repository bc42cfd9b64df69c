//! A user's role on an agency.

use immersion_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `user_agency_rights` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserAgencyRight {
    pub id: DbId,
    pub user_id: DbId,
    pub agency_id: DbId,
    pub role: String,
    pub is_notified_by_email: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One entry of a rights assignment made by the back-office.
#[derive(Debug, Clone, Deserialize)]
pub struct AgencyRightInput {
    pub agency_id: DbId,
    pub role: String,
    #[serde(default = "default_notified")]
    pub is_notified_by_email: bool,
}

fn default_notified() -> bool {
    true
}
