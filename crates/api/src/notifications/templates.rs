//! Plain-text bodies of the emails and SMS sent by the platform.
//!
//! Every function is pure so the wording can be tested without gateways.

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

impl Rendered {
    fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

const SIGNATURE: &str = "L'équipe Immersion Facilitée";

/// What the convention is about, e.g. "Jeanne Dupont chez Boulangerie Martin".
pub struct ConventionSummary<'a> {
    pub beneficiary_name: &'a str,
    pub business_name: &'a str,
    pub job_label: &'a str,
}

impl ConventionSummary<'_> {
    fn describe(&self) -> String {
        format!(
            "l'immersion de {} chez {} ({})",
            self.beneficiary_name, self.business_name, self.job_label
        )
    }
}

// ---------------------------------------------------------------------------
// Conventions
// ---------------------------------------------------------------------------

pub fn signature_request(summary: &ConventionSummary<'_>, role_label: &str, link: &str) -> Rendered {
    Rendered::new(
        format!("À signer : convention d'immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             Une demande de convention a été déposée pour {}.\n\
             En tant que {role_label}, votre signature est attendue.\n\n\
             Relisez et signez la convention ici :\n{link}\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn signature_sms(link: &str) -> String {
    format!("Immersion Facilitée : une convention d'immersion attend votre signature. {link}")
}

pub fn signature_confirmation(summary: &ConventionSummary<'_>) -> Rendered {
    Rendered::new(
        format!("Signature enregistrée pour {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             Votre signature de la convention concernant {} a bien été enregistrée.\n\
             La convention sera examinée dès que toutes les parties auront signé.\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn review_request(summary: &ConventionSummary<'_>, agency_name: &str, link: &str) -> Rendered {
    Rendered::new(
        format!("À examiner : convention d'immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             La convention concernant {} est signée par toutes les parties.\n\
             Elle attend l'examen de {agency_name}.\n\n\
             Examinez la convention ici :\n{link}\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn validation_request(summary: &ConventionSummary<'_>, link: &str) -> Rendered {
    Rendered::new(
        format!("À valider : convention d'immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             Un conseiller a donné son accord pour {}.\n\
             La convention attend maintenant votre validation.\n\n\
             Validez ou refusez la convention ici :\n{link}\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn convention_validated(
    summary: &ConventionSummary<'_>,
    date_start: &str,
    date_end: &str,
    link: &str,
) -> Rendered {
    Rendered::new(
        format!("Convention validée : immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             La convention concernant {} est validée.\n\
             L'immersion aura lieu du {date_start} au {date_end}.\n\n\
             Consultez la convention ici :\n{link}\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

/// Rejection, cancellation or deprecation of a convention.
pub fn convention_closed(
    summary: &ConventionSummary<'_>,
    outcome: &str,
    justification: Option<&str>,
) -> Rendered {
    let reason = justification
        .map(|j| format!("Motif : {j}\n\n"))
        .unwrap_or_default();
    Rendered::new(
        format!("Convention {outcome} : immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             La convention concernant {} a été {outcome}.\n\
             {reason}\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn modification_request(
    summary: &ConventionSummary<'_>,
    justification: Option<&str>,
    link: &str,
) -> Rendered {
    let reason = justification
        .map(|j| format!("Modifications demandées : {j}\n\n"))
        .unwrap_or_default();
    Rendered::new(
        format!("À modifier : convention d'immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             Des modifications sont demandées sur la convention concernant {}.\n\
             {reason}\
             Les signatures précédentes sont annulées. Modifiez la convention ici :\n{link}\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

pub fn renewed_link(link: &str) -> Rendered {
    Rendered::new(
        "Votre nouveau lien Immersion Facilitée",
        format!(
            "Bonjour,\n\n\
             Vous avez demandé un nouveau lien d'accès à votre convention d'immersion.\n\
             Le voici :\n{link}\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn assessment_created(summary: &ConventionSummary<'_>, status_label: &str) -> Rendered {
    Rendered::new(
        format!("Bilan d'immersion de {}", summary.beneficiary_name),
        format!(
            "Bonjour,\n\n\
             Le tuteur a rempli le bilan de {}.\n\
             Résultat : {status_label}.\n\n\
             {SIGNATURE}",
            summary.describe()
        ),
    )
}

// ---------------------------------------------------------------------------
// Agencies
// ---------------------------------------------------------------------------

pub fn agency_registered(agency_name: &str) -> Rendered {
    Rendered::new(
        format!("Demande de référencement de {agency_name}"),
        format!(
            "Bonjour,\n\n\
             La structure {agency_name} a demandé son référencement sur Immersion Facilitée.\n\
             Vous recevrez un email dès que notre équipe l'aura examinée.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn agency_activated(agency_name: &str) -> Rendered {
    Rendered::new(
        format!("{agency_name} est référencée"),
        format!(
            "Bonjour,\n\n\
             La structure {agency_name} est désormais référencée.\n\
             Les candidats peuvent la choisir pour leurs conventions d'immersion.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn agency_rejected(agency_name: &str, justification: Option<&str>) -> Rendered {
    let reason = justification
        .map(|j| format!("Motif : {j}\n\n"))
        .unwrap_or_default();
    Rendered::new(
        format!("Référencement de {agency_name} refusé"),
        format!(
            "Bonjour,\n\n\
             La demande de référencement de {agency_name} a été refusée.\n\
             {reason}\
             {SIGNATURE}"
        ),
    )
}

pub fn agency_closed(agency_name: &str) -> Rendered {
    Rendered::new(
        format!("{agency_name} n'est plus référencée"),
        format!(
            "Bonjour,\n\n\
             La structure {agency_name} a été fermée sur Immersion Facilitée.\n\
             Elle ne reçoit plus de nouvelles conventions.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn agency_right_requested(user_name: &str, user_email: &str, agency_name: &str) -> Rendered {
    Rendered::new(
        format!("Demande d'accès à {agency_name}"),
        format!(
            "Bonjour,\n\n\
             {user_name} ({user_email}) demande à rejoindre {agency_name}.\n\
             Attribuez-lui un rôle depuis votre espace agence.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn agency_rights_updated(first_name: &str) -> Rendered {
    Rendered::new(
        "Vos droits ont été modifiés",
        format!(
            "Bonjour {first_name},\n\n\
             Vos droits d'accès aux structures d'accompagnement ont été mis à jour.\n\
             Connectez-vous pour les consulter.\n\n\
             {SIGNATURE}"
        ),
    )
}

// ---------------------------------------------------------------------------
// Establishments
// ---------------------------------------------------------------------------

pub fn establishment_added(business_name: &str) -> Rendered {
    Rendered::new(
        format!("{business_name} est référencée comme entreprise accueillante"),
        format!(
            "Bonjour,\n\n\
             Merci ! {business_name} apparaît maintenant dans la recherche d'entreprises \
             accueillantes.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn establishment_edited(business_name: &str) -> Rendered {
    Rendered::new(
        format!("Fiche de {business_name} modifiée"),
        format!(
            "Bonjour,\n\n\
             Les modifications de la fiche de {business_name} ont été enregistrées.\n\n\
             {SIGNATURE}"
        ),
    )
}

pub fn establishment_edit_link(business_name: &str, link: &str) -> Rendered {
    Rendered::new(
        format!("Modifier la fiche de {business_name}"),
        format!(
            "Bonjour,\n\n\
             Voici le lien pour modifier la fiche de {business_name}. Il est valable peu de temps :\n\
             {link}\n\n\
             {SIGNATURE}"
        ),
    )
}

/// Candidate details forwarded to an establishment that takes contacts by email.
pub struct CandidateContact<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub message: &'a str,
}

pub fn contact_request_to_establishment(
    candidate: &CandidateContact<'_>,
    job_label: &str,
) -> Rendered {
    let phone = candidate
        .phone
        .map(|p| format!("Téléphone : {p}\n"))
        .unwrap_or_default();
    Rendered::new(
        format!("{} souhaite découvrir le métier de {job_label}", candidate.name),
        format!(
            "Bonjour,\n\n\
             {} souhaite faire une immersion dans votre entreprise ({job_label}).\n\n\
             Son message :\n{}\n\n\
             Email : {}\n\
             {phone}\n\
             Répondez directement à cet email pour lui écrire.\n\n\
             {SIGNATURE}",
            candidate.name, candidate.message, candidate.email
        ),
    )
}

/// How the candidate should reach an establishment that is not contacted by email.
pub fn contact_details_to_candidate(
    business_name: &str,
    contact_name: &str,
    how_to_reach: &str,
    job_label: &str,
) -> Rendered {
    Rendered::new(
        format!("Coordonnées de {business_name}"),
        format!(
            "Bonjour,\n\n\
             Vous souhaitez découvrir le métier de {job_label} chez {business_name}.\n\
             Contactez {contact_name} {how_to_reach}.\n\n\
             {SIGNATURE}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ConventionSummary<'static> {
        ConventionSummary {
            beneficiary_name: "Jeanne Dupont",
            business_name: "Boulangerie Martin",
            job_label: "Boulanger / Boulangère",
        }
    }

    #[test]
    fn signature_request_carries_link_and_role() {
        let email = signature_request(&summary(), "bénéficiaire", "https://x/convention/sign?jwt=abc");
        assert!(email.subject.contains("Jeanne Dupont"));
        assert!(email.body.contains("bénéficiaire"));
        assert!(email.body.contains("https://x/convention/sign?jwt=abc"));
        assert!(email.body.contains("Boulangerie Martin"));
    }

    #[test]
    fn closed_convention_mentions_justification_when_given() {
        let with = convention_closed(&summary(), "refusée", Some("dates incohérentes"));
        assert!(with.body.contains("Motif : dates incohérentes"));

        let without = convention_closed(&summary(), "annulée", None);
        assert!(!without.body.contains("Motif"));
        assert!(without.subject.starts_with("Convention annulée"));
    }

    #[test]
    fn contact_request_lists_candidate_details() {
        let email = contact_request_to_establishment(
            &CandidateContact {
                name: "Jeanne Dupont",
                email: "jeanne@mail.fr",
                phone: Some("0611223344"),
                message: "Bonjour !",
            },
            "Boulanger / Boulangère",
        );
        assert!(email.body.contains("jeanne@mail.fr"));
        assert!(email.body.contains("Téléphone : 0611223344"));
        assert!(email.body.contains("Bonjour !"));
    }

    #[test]
    fn sms_is_short() {
        let sms = signature_sms("https://immersion.fr/convention/sign?jwt=abc");
        assert!(sms.len() < 160);
    }
}
