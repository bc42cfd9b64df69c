//! Repository for the `establishments` and `establishment_offers` tables.

use immersion_core::appellation::Appellation;
use immersion_core::establishment::{EstablishmentForm, DEFAULT_MAX_CONTACTS_PER_WEEK};
use immersion_core::types::{DbId, Timestamp};
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor};

use crate::models::establishment::{
    Establishment, EstablishmentOffer, EstablishmentWithOffers, SearchFilter, SearchResult,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, siret, business_name, business_name_customized, street_address, \
                       postcode, department_code, city, naf_code, website, \
                       additional_information, business_contact, max_contacts_per_week, \
                       is_searchable, created_at, updated_at";

const OFFER_COLUMNS: &str =
    "id, establishment_id, appellation_code, appellation_label, rome_code, created_at, updated_at";

/// Provides persistence for establishments and their offers.
pub struct EstablishmentRepo;

impl EstablishmentRepo {
    /// Insert an establishment and its offers.
    ///
    /// A second registration for the same SIRET violates
    /// `uq_establishments_siret`.
    pub async fn create(
        conn: &mut PgConnection,
        form: &EstablishmentForm,
        department_code: &str,
    ) -> Result<EstablishmentWithOffers, sqlx::Error> {
        let query = format!(
            "INSERT INTO establishments (siret, business_name, business_name_customized, \
                 street_address, postcode, department_code, city, naf_code, website, \
                 additional_information, business_contact, max_contacts_per_week, is_searchable)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {COLUMNS}"
        );
        let establishment = sqlx::query_as::<_, Establishment>(&query)
            .bind(&form.siret)
            .bind(&form.business_name)
            .bind(&form.business_name_customized)
            .bind(&form.street_address)
            .bind(&form.postcode)
            .bind(department_code)
            .bind(&form.city)
            .bind(&form.naf_code)
            .bind(&form.website)
            .bind(&form.additional_information)
            .bind(Json(&form.business_contact))
            .bind(form.max_contacts_per_week.unwrap_or(DEFAULT_MAX_CONTACTS_PER_WEEK))
            .bind(form.is_searchable)
            .fetch_one(&mut *conn)
            .await?;

        let offers = Self::insert_offers(conn, establishment.id, &form.offers).await?;
        Ok(EstablishmentWithOffers {
            establishment,
            offers,
        })
    }

    pub async fn find_by_siret(
        executor: impl PgExecutor<'_>,
        siret: &str,
    ) -> Result<Option<Establishment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM establishments WHERE siret = $1");
        sqlx::query_as::<_, Establishment>(&query)
            .bind(siret)
            .fetch_optional(executor)
            .await
    }

    /// Load an establishment with its offers.
    pub async fn find_with_offers(
        conn: &mut PgConnection,
        siret: &str,
    ) -> Result<Option<EstablishmentWithOffers>, sqlx::Error> {
        let Some(establishment) = Self::find_by_siret(&mut *conn, siret).await? else {
            return Ok(None);
        };
        let offers = Self::list_offers(&mut *conn, establishment.id).await?;
        Ok(Some(EstablishmentWithOffers {
            establishment,
            offers,
        }))
    }

    pub async fn list_offers(
        executor: impl PgExecutor<'_>,
        establishment_id: DbId,
    ) -> Result<Vec<EstablishmentOffer>, sqlx::Error> {
        let query = format!(
            "SELECT {OFFER_COLUMNS} FROM establishment_offers
             WHERE establishment_id = $1
             ORDER BY appellation_code"
        );
        sqlx::query_as::<_, EstablishmentOffer>(&query)
            .bind(establishment_id)
            .fetch_all(executor)
            .await
    }

    pub async fn find_offer(
        executor: impl PgExecutor<'_>,
        establishment_id: DbId,
        appellation_code: &str,
    ) -> Result<Option<EstablishmentOffer>, sqlx::Error> {
        let query = format!(
            "SELECT {OFFER_COLUMNS} FROM establishment_offers
             WHERE establishment_id = $1 AND appellation_code = $2"
        );
        sqlx::query_as::<_, EstablishmentOffer>(&query)
            .bind(establishment_id)
            .bind(appellation_code)
            .fetch_optional(executor)
            .await
    }

    /// Overwrite an establishment from an edited form and replace its offers.
    ///
    /// Returns `None` if no establishment has this SIRET.
    pub async fn update(
        conn: &mut PgConnection,
        form: &EstablishmentForm,
        department_code: &str,
    ) -> Result<Option<EstablishmentWithOffers>, sqlx::Error> {
        let query = format!(
            "UPDATE establishments SET
                business_name = $2,
                business_name_customized = $3,
                street_address = $4,
                postcode = $5,
                department_code = $6,
                city = $7,
                naf_code = $8,
                website = $9,
                additional_information = $10,
                business_contact = $11,
                max_contacts_per_week = COALESCE($12, max_contacts_per_week),
                is_searchable = $13
             WHERE siret = $1
             RETURNING {COLUMNS}"
        );
        let Some(establishment) = sqlx::query_as::<_, Establishment>(&query)
            .bind(&form.siret)
            .bind(&form.business_name)
            .bind(&form.business_name_customized)
            .bind(&form.street_address)
            .bind(&form.postcode)
            .bind(department_code)
            .bind(&form.city)
            .bind(&form.naf_code)
            .bind(&form.website)
            .bind(&form.additional_information)
            .bind(Json(&form.business_contact))
            .bind(form.max_contacts_per_week)
            .bind(form.is_searchable)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM establishment_offers WHERE establishment_id = $1")
            .bind(establishment.id)
            .execute(&mut *conn)
            .await?;
        let offers = Self::insert_offers(conn, establishment.id, &form.offers).await?;

        Ok(Some(EstablishmentWithOffers {
            establishment,
            offers,
        }))
    }

    /// Delete an establishment with its offers and discussions. Returns
    /// `true` if a row was removed.
    pub async fn delete(executor: impl PgExecutor<'_>, siret: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM establishments WHERE siret = $1")
            .bind(siret)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load an establishment and lock its row until the transaction ends.
    ///
    /// Contact requests for the same establishment are serialised on this
    /// lock so the weekly count and the cooldown check see every discussion.
    pub async fn lock_by_siret(
        conn: &mut PgConnection,
        siret: &str,
    ) -> Result<Option<Establishment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM establishments WHERE siret = $1 FOR UPDATE");
        sqlx::query_as::<_, Establishment>(&query)
            .bind(siret)
            .fetch_optional(conn)
            .await
    }

    /// Searchable establishments offering the requested job, one row per
    /// matching offer.
    ///
    /// An establishment that received `max_contacts_per_week` requests since
    /// `contacts_since` is left out until older requests fall out of the
    /// window.
    pub async fn search(
        executor: impl PgExecutor<'_>,
        filter: &SearchFilter,
        contacts_since: Timestamp,
        limit: i64,
    ) -> Result<Vec<SearchResult>, sqlx::Error> {
        sqlx::query_as::<_, SearchResult>(
            "SELECT e.siret, e.business_name, e.business_name_customized, e.street_address,
                    e.postcode, e.department_code, e.city, e.naf_code, e.website,
                    e.additional_information, e.business_contact->>'contact_mode' AS contact_mode,
                    o.appellation_code, o.appellation_label, o.rome_code
             FROM establishments e
             JOIN establishment_offers o ON o.establishment_id = e.id
             WHERE e.is_searchable = true
               AND ($1::TEXT IS NULL OR o.rome_code = $1)
               AND ($2::TEXT IS NULL OR o.appellation_code = $2)
               AND ($3::TEXT IS NULL OR e.department_code = $3)
               AND (SELECT COUNT(*) FROM discussions d
                    WHERE d.establishment_id = e.id AND d.created_at >= $4)
                   < e.max_contacts_per_week
             ORDER BY e.updated_at DESC, e.id, o.appellation_code
             LIMIT $5",
        )
        .bind(&filter.rome)
        .bind(&filter.appellation_code)
        .bind(&filter.department)
        .bind(contacts_since)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    async fn insert_offers(
        conn: &mut PgConnection,
        establishment_id: DbId,
        offers: &[Appellation],
    ) -> Result<Vec<EstablishmentOffer>, sqlx::Error> {
        let query = format!(
            "INSERT INTO establishment_offers (establishment_id, appellation_code, \
                                               appellation_label, rome_code)
             VALUES ($1, $2, $3, $4)
             RETURNING {OFFER_COLUMNS}"
        );
        let mut created = Vec::with_capacity(offers.len());
        for offer in offers {
            let row = sqlx::query_as::<_, EstablishmentOffer>(&query)
                .bind(establishment_id)
                .bind(&offer.appellation_code)
                .bind(offer.appellation_label.trim())
                .bind(&offer.rome_code)
                .fetch_one(&mut *conn)
                .await?;
            created.push(row);
        }
        Ok(created)
    }
}
