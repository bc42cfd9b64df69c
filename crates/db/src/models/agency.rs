//! Agency entity model and DTOs.

use immersion_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `agencies` table.
///
/// `kind` and `status` hold the serialized forms of
/// [`AgencyKind`](immersion_core::agency::AgencyKind) and
/// [`AgencyStatus`](immersion_core::agency::AgencyStatus).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agency {
    pub id: DbId,
    pub name: String,
    pub kind: String,
    pub status: String,
    pub address: String,
    pub postcode: String,
    pub department_code: String,
    pub city: String,
    pub agency_siret: Option<String>,
    pub counsellor_emails: Vec<String>,
    pub validator_emails: Vec<String>,
    pub refers_to_agency_id: Option<DbId>,
    pub rejection_justification: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The subset of an agency shown to anonymous visitors.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AgencyPublic {
    pub id: DbId,
    pub name: String,
    pub kind: String,
    pub address: String,
    pub postcode: String,
    pub department_code: String,
    pub city: String,
    pub refers_to_agency_id: Option<DbId>,
}

impl From<&Agency> for AgencyPublic {
    fn from(agency: &Agency) -> Self {
        Self {
            id: agency.id,
            name: agency.name.clone(),
            kind: agency.kind.clone(),
            address: agency.address.clone(),
            postcode: agency.postcode.clone(),
            department_code: agency.department_code.clone(),
            city: agency.city.clone(),
            refers_to_agency_id: agency.refers_to_agency_id,
        }
    }
}

/// DTO for registering a new agency.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgency {
    pub name: String,
    pub kind: String,
    pub address: String,
    pub postcode: String,
    /// Derived from the postcode by the caller.
    #[serde(skip)]
    pub department_code: String,
    pub city: String,
    pub agency_siret: Option<String>,
    #[serde(default)]
    pub counsellor_emails: Vec<String>,
    #[serde(default)]
    pub validator_emails: Vec<String>,
    pub refers_to_agency_id: Option<DbId>,
}

/// DTO for editing an agency. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAgency {
    pub name: Option<String>,
    pub address: Option<String>,
    pub postcode: Option<String>,
    #[serde(skip)]
    pub department_code: Option<String>,
    pub city: Option<String>,
    pub agency_siret: Option<String>,
    pub counsellor_emails: Option<Vec<String>>,
    pub validator_emails: Option<Vec<String>>,
}

/// Filters for the public agency list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgencyFilter {
    pub department: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
}
