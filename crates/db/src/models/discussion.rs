//! Discussion (contact request) entity model.

use immersion_core::establishment::ContactRequest;
use immersion_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `discussions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Discussion {
    pub id: DbId,
    pub establishment_id: DbId,
    pub siret: String,
    pub appellation_code: String,
    pub contact_mode: String,
    pub status: String,
    pub potential_beneficiary_first_name: String,
    pub potential_beneficiary_last_name: String,
    pub potential_beneficiary_email: String,
    pub potential_beneficiary_phone: Option<String>,
    pub message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateDiscussion<'a> {
    pub establishment_id: DbId,
    pub request: &'a ContactRequest,
}
