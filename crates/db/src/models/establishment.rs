//! Establishment and offer entity models.

use immersion_core::establishment::BusinessContact;
use immersion_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `establishments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Establishment {
    pub id: DbId,
    pub siret: String,
    pub business_name: String,
    pub business_name_customized: Option<String>,
    pub street_address: String,
    pub postcode: String,
    pub department_code: String,
    pub city: String,
    pub naf_code: Option<String>,
    pub website: Option<String>,
    pub additional_information: Option<String>,
    pub business_contact: Json<BusinessContact>,
    pub max_contacts_per_week: i32,
    pub is_searchable: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `establishment_offers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EstablishmentOffer {
    pub id: DbId,
    pub establishment_id: DbId,
    pub appellation_code: String,
    pub appellation_label: String,
    pub rome_code: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An establishment with its offers, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct EstablishmentWithOffers {
    #[serde(flatten)]
    pub establishment: Establishment,
    pub offers: Vec<EstablishmentOffer>,
}

/// One search hit: the establishment and the offer that matched.
///
/// The business contact is left out; candidates go through the contact
/// request flow.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SearchResult {
    pub siret: String,
    pub business_name: String,
    pub business_name_customized: Option<String>,
    pub street_address: String,
    pub postcode: String,
    pub department_code: String,
    pub city: String,
    pub naf_code: Option<String>,
    pub website: Option<String>,
    pub additional_information: Option<String>,
    pub contact_mode: String,
    pub appellation_code: String,
    pub appellation_label: String,
    pub rome_code: String,
}

/// Search filters. At least one of `rome` or `appellation_code` is expected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilter {
    pub rome: Option<String>,
    pub appellation_code: Option<String>,
    pub department: Option<String>,
    pub limit: Option<i64>,
}
