//! Business registry (SIRENE) lookups.
//!
//! [`HttpSiretGateway`] queries the INSEE SIRENE API. Without credentials the
//! [`OfflineSiretGateway`] trusts submitted data, which is what local
//! development and tests use.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_SIRENE_API_URL: &str = "https://api.insee.fr/entreprises/sirene/V3.11";

#[derive(Debug, thiserror::Error)]
pub enum SiretError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SIRENE API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Unexpected SIRENE response: {0}")]
    Parse(String),
}

/// What the registry knows about an establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiretEstablishment {
    pub siret: String,
    pub business_name: String,
    pub business_address: String,
    pub naf_code: Option<String>,
    /// `false` once the establishment has been administratively closed.
    pub is_open: bool,
}

#[async_trait]
pub trait SiretGateway: Send + Sync {
    /// Look up an establishment. `Ok(None)` means the registry does not
    /// know this siret.
    async fn get_establishment(&self, siret: &str) -> Result<Option<SiretEstablishment>, SiretError>;
}

// ---------------------------------------------------------------------------
// SiretConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SiretConfig {
    pub api_url: String,
    pub api_token: String,
}

impl SiretConfig {
    /// Returns `None` when `SIRENE_API_TOKEN` is not set.
    /// `SIRENE_API_URL` defaults to the public INSEE endpoint.
    pub fn from_env() -> Option<Self> {
        let api_token = std::env::var("SIRENE_API_TOKEN").ok()?;
        let api_url = std::env::var("SIRENE_API_URL")
            .unwrap_or_else(|_| DEFAULT_SIRENE_API_URL.to_string());
        Some(Self { api_url, api_token })
    }
}

// ---------------------------------------------------------------------------
// HttpSiretGateway
// ---------------------------------------------------------------------------

pub struct HttpSiretGateway {
    client: reqwest::Client,
    config: SiretConfig,
}

impl HttpSiretGateway {
    pub fn new(config: SiretConfig) -> Result<Self, SiretError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SiretGateway for HttpSiretGateway {
    async fn get_establishment(&self, siret: &str) -> Result<Option<SiretEstablishment>, SiretError> {
        let url = format!("{}/siret/{siret}", self.config.api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: serde_json::Value = response.json().await?;
                parse_sirene_response(&body).map(Some)
            }
            status => {
                tracing::warn!(siret, status = status.as_u16(), "SIRENE lookup failed");
                Err(SiretError::HttpStatus(status.as_u16()))
            }
        }
    }
}

#[derive(Deserialize)]
struct SireneResponse {
    etablissement: SireneEtablissement,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SireneEtablissement {
    siret: String,
    unite_legale: SireneUniteLegale,
    adresse_etablissement: SireneAdresse,
    #[serde(default)]
    periodes_etablissement: Vec<SirenePeriode>,
}

#[derive(Deserialize)]
struct SireneUniteLegale {
    #[serde(rename = "denominationUniteLegale")]
    denomination: Option<String>,
    #[serde(rename = "nomUniteLegale")]
    nom: Option<String>,
    #[serde(rename = "prenomUsuelUniteLegale")]
    prenom: Option<String>,
    #[serde(rename = "activitePrincipaleUniteLegale")]
    activite_principale: Option<String>,
}

#[derive(Deserialize)]
struct SireneAdresse {
    #[serde(rename = "numeroVoieEtablissement")]
    numero: Option<String>,
    #[serde(rename = "typeVoieEtablissement")]
    type_voie: Option<String>,
    #[serde(rename = "libelleVoieEtablissement")]
    libelle_voie: Option<String>,
    #[serde(rename = "codePostalEtablissement")]
    code_postal: Option<String>,
    #[serde(rename = "libelleCommuneEtablissement")]
    commune: Option<String>,
}

#[derive(Deserialize)]
struct SirenePeriode {
    #[serde(rename = "etatAdministratifEtablissement")]
    etat_administratif: Option<String>,
}

/// Map an INSEE `/siret/{siret}` response body. The first period is the
/// current one; state `A` means active.
pub fn parse_sirene_response(body: &serde_json::Value) -> Result<SiretEstablishment, SiretError> {
    let response: SireneResponse =
        serde_json::from_value(body.clone()).map_err(|e| SiretError::Parse(e.to_string()))?;
    let etab = response.etablissement;

    let legal = etab.unite_legale;
    let business_name = legal
        .denomination
        .or_else(|| {
            let parts: Vec<String> = [legal.prenom, legal.nom].into_iter().flatten().collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        })
        .ok_or_else(|| SiretError::Parse("missing business name".into()))?;

    let addr = etab.adresse_etablissement;
    let street = [addr.numero, addr.type_voie, addr.libelle_voie]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let city = [addr.code_postal, addr.commune]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    let business_address = [street, city]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let is_open = etab
        .periodes_etablissement
        .first()
        .and_then(|p| p.etat_administratif.as_deref())
        .is_none_or(|state| state == "A");

    Ok(SiretEstablishment {
        siret: etab.siret,
        business_name,
        business_address,
        naf_code: legal.activite_principale.map(|code| code.replace('.', "")),
        is_open,
    })
}

// ---------------------------------------------------------------------------
// OfflineSiretGateway
// ---------------------------------------------------------------------------

/// Registry stand-in. In trusting mode every siret resolves to an open
/// establishment; otherwise only the registered ones exist.
#[derive(Default)]
pub struct OfflineSiretGateway {
    trusting: bool,
    known: HashMap<String, SiretEstablishment>,
}

impl OfflineSiretGateway {
    pub fn trusting() -> Self {
        Self {
            trusting: true,
            known: HashMap::new(),
        }
    }

    pub fn with_known(establishments: impl IntoIterator<Item = SiretEstablishment>) -> Self {
        Self {
            trusting: false,
            known: establishments
                .into_iter()
                .map(|e| (e.siret.clone(), e))
                .collect(),
        }
    }
}

#[async_trait]
impl SiretGateway for OfflineSiretGateway {
    async fn get_establishment(&self, siret: &str) -> Result<Option<SiretEstablishment>, SiretError> {
        if let Some(known) = self.known.get(siret) {
            return Ok(Some(known.clone()));
        }
        if self.trusting {
            return Ok(Some(SiretEstablishment {
                siret: siret.to_string(),
                business_name: String::new(),
                business_address: String::new(),
                naf_code: None,
                is_open: true,
            }));
        }
        Ok(None)
    }
}
