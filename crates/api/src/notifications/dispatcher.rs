//! Event-to-notification dispatch.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use immersion_core::events::Topic;
use immersion_core::establishment::ContactMode;
use immersion_core::roles::Role;
use immersion_core::types::DbId;
use immersion_core::validation::email_hash;
use immersion_db::models::agency::Agency;
use immersion_db::models::convention::Convention;
use immersion_db::models::notification::{
    CreateNotification, KIND_EMAIL, KIND_SMS, STATE_FAILED, STATE_SENT,
};
use immersion_db::repositories::{
    AgencyRepo, AgencyRightRepo, AssessmentRepo, ConventionRepo, DiscussionRepo,
    EstablishmentRepo, NotificationRepo, UserRepo,
};
use immersion_db::DbPool;
use immersion_events::delivery::sms::to_international;
use immersion_events::{
    DomainEvent, EmailGateway, EmailMessage, EventSubscriber, SmsGateway, SmsMessage,
    SubscriberError,
};

use super::templates::{self, CandidateContact, ConventionSummary, Rendered};
use crate::auth::magic_link::{
    frontend_link, generate_convention_jwt, generate_establishment_jwt, MagicLinkConfig,
};
use crate::auth::token::TokenError;
use crate::middleware::convention_access::party_emails;

#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Cannot sign magic link: {0}")]
    Token(#[from] TokenError),

    #[error("Event payload has no '{0}'")]
    MissingPayload(&'static str),

    /// The entity the event refers to is gone; there is nobody to notify.
    #[error("{0} no longer exists")]
    Gone(String),

    #[error("{0}")]
    Lookup(String),
}

/// A message waiting to be sent.
#[derive(Debug, Clone)]
enum Outgoing {
    Email(EmailMessage),
    Sms(SmsMessage),
}

impl Outgoing {
    fn email(to: &str, rendered: Rendered) -> Self {
        Self::Email(EmailMessage::new(to.trim().to_lowercase(), rendered.subject, rendered.body))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => KIND_EMAIL,
            Self::Sms(_) => KIND_SMS,
        }
    }

    fn recipient(&self) -> String {
        match self {
            Self::Email(email) => email.to.join(", "),
            Self::Sms(sms) => sms.phone.clone(),
        }
    }
}

/// Sends the notifications of each published event.
///
/// Delivery is idempotent per outbox row: recipients already served by a
/// previous attempt of the same event are skipped on retry.
pub struct NotificationDispatcher {
    pool: DbPool,
    email: Arc<dyn EmailGateway>,
    sms: Arc<dyn SmsGateway>,
    magic_links: MagicLinkConfig,
    frontend_base_url: String,
}

impl NotificationDispatcher {
    pub fn new(
        pool: DbPool,
        email: Arc<dyn EmailGateway>,
        sms: Arc<dyn SmsGateway>,
        magic_links: MagicLinkConfig,
        frontend_base_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            email,
            sms,
            magic_links,
            frontend_base_url: frontend_base_url.into(),
        }
    }

    async fn build(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        match event.topic {
            Topic::ConventionSubmitted => self.signature_requests(event).await,
            Topic::ConventionPartiallySigned => self.signature_confirmation(event).await,
            Topic::ConventionFullySigned => self.review_requests(event).await,
            Topic::ConventionAcceptedByCounsellor => self.validation_requests(event).await,
            Topic::ConventionAcceptedByValidator => self.convention_validated(event).await,
            Topic::ConventionRejected => self.convention_closed(event, "refusée").await,
            Topic::ConventionCancelled => self.convention_closed(event, "annulée").await,
            Topic::ConventionDeprecated => self.convention_closed(event, "déclarée obsolète").await,
            Topic::ConventionRequiresModification => self.modification_requests(event).await,
            Topic::MagicLinkRenewalRequested => self.renewed_link(event).await,
            Topic::AgencyRegistered
            | Topic::AgencyActivated
            | Topic::AgencyRejected
            | Topic::AgencyClosed => self.agency_notice(event).await,
            Topic::FormEstablishmentAdded
            | Topic::FormEstablishmentEdited
            | Topic::EstablishmentEditLinkRequested => self.establishment_notice(event).await,
            Topic::ContactRequestedByBeneficiary => self.contact_request(event).await,
            Topic::AssessmentCreated => self.assessment_created(event).await,
            Topic::AgencyRightRequested => self.agency_right_requested(event).await,
            Topic::AgencyRightsUpdated => self.agency_rights_updated(event).await,
        }
    }

    // -----------------------------------------------------------------------
    // Conventions
    // -----------------------------------------------------------------------

    async fn signature_requests(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let summary = summary(&convention);
        let mut out = Vec::new();

        for role in convention.signatories.roles() {
            let Some(email) = convention.signatories.email_for(role) else {
                continue;
            };
            let link = self.convention_link(&convention, role, email)?;
            out.push(Outgoing::email(
                email,
                templates::signature_request(&summary, role_label(role), &link),
            ));

            if let Some(phone) = convention.signatories.phone_for(role) {
                if is_mobile(phone) {
                    out.push(Outgoing::Sms(SmsMessage {
                        phone: phone.to_string(),
                        text: templates::signature_sms(&link),
                    }));
                }
            }
        }
        Ok(out)
    }

    async fn signature_confirmation(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let role = payload_role(event)?;
        let Some(email) = convention.signatories.email_for(role) else {
            return Ok(Vec::new());
        };
        Ok(vec![Outgoing::email(
            email,
            templates::signature_confirmation(&summary(&convention)),
        )])
    }

    /// Fully signed: counsellors review first. Agencies without counsellors
    /// send straight to their validators, unless conventions are referred
    /// to another agency.
    async fn review_requests(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let agency = self.agency(convention.agency_id).await?;
        let summary = summary(&convention);

        let mut reviewers: Vec<(Role, &str)> = agency
            .counsellor_emails
            .iter()
            .map(|e| (Role::Counsellor, e.as_str()))
            .collect();
        if agency.refers_to_agency_id.is_none() {
            reviewers.extend(agency.validator_emails.iter().map(|e| (Role::Validator, e.as_str())));
        }

        let mut out = Vec::with_capacity(reviewers.len());
        for (role, email) in reviewers {
            let link = self.convention_link(&convention, role, email)?;
            out.push(Outgoing::email(
                email,
                templates::review_request(&summary, &agency.name, &link),
            ));
        }
        Ok(out)
    }

    async fn validation_requests(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let summary = summary(&convention);
        let validators = self.emails_for(&convention, Role::Validator).await?;

        let mut out = Vec::with_capacity(validators.len());
        for email in &validators {
            let link = self.convention_link(&convention, Role::Validator, email)?;
            out.push(Outgoing::email(email, templates::validation_request(&summary, &link)));
        }
        Ok(out)
    }

    async fn convention_validated(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let summary = summary(&convention);
        let start = convention.date_start.format("%d/%m/%Y").to_string();
        let end = convention.date_end.format("%d/%m/%Y").to_string();

        let mut parties: Vec<(Role, String)> = convention
            .signatories
            .roles()
            .into_iter()
            .filter_map(|role| {
                convention
                    .signatories
                    .email_for(role)
                    .map(|email| (role, email.to_string()))
            })
            .collect();
        parties.push((Role::EstablishmentTutor, convention.establishment_tutor.email.clone()));

        let mut out = Vec::with_capacity(parties.len());
        for (role, email) in &parties {
            let link = self.convention_link(&convention, *role, email)?;
            out.push(Outgoing::email(
                email,
                templates::convention_validated(&summary, &start, &end, &link),
            ));
        }
        Ok(out)
    }

    async fn convention_closed(
        &self,
        event: &DomainEvent,
        outcome: &str,
    ) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let agency = self.agency(convention.agency_id).await?;
        let justification = convention
            .status_justification
            .as_deref()
            .or_else(|| event.payload_str("justification"));
        let rendered = templates::convention_closed(&summary(&convention), outcome, justification);

        let recipients = convention
            .signatories
            .roles()
            .into_iter()
            .filter_map(|role| convention.signatories.email_for(role).map(str::to_string))
            .chain(agency.counsellor_emails.iter().cloned())
            .chain(agency.validator_emails.iter().cloned());

        Ok(recipients
            .map(|email| Outgoing::email(&email, rendered.clone()))
            .collect())
    }

    async fn modification_requests(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let summary = summary(&convention);
        let justification = convention
            .status_justification
            .as_deref()
            .or_else(|| event.payload_str("justification"));

        let mut out = Vec::new();
        for role in convention.signatories.roles() {
            let Some(email) = convention.signatories.email_for(role) else {
                continue;
            };
            let token = generate_convention_jwt(convention.id, role, email, &self.magic_links)?;
            let link = frontend_link(&self.frontend_base_url, "convention/edit", &token);
            out.push(Outgoing::email(
                email,
                templates::modification_request(&summary, justification, &link),
            ));
        }
        Ok(out)
    }

    async fn renewed_link(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let role = payload_role(event)?;
        let hash = event
            .payload_str("email_hash")
            .ok_or(DispatchError::MissingPayload("email_hash"))?;

        let candidates = self.emails_for(&convention, role).await?;
        let Some(email) = candidates.iter().find(|email| email_hash(email) == hash) else {
            tracing::warn!(
                convention_id = convention.id,
                role = %role,
                "Renewal requested by someone no longer party to the convention",
            );
            return Ok(Vec::new());
        };
        let link = self.convention_link(&convention, role, email)?;
        Ok(vec![Outgoing::email(email, templates::renewed_link(&link))])
    }

    async fn assessment_created(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let convention = self.convention(event).await?;
        let agency = self.agency(convention.agency_id).await?;
        let assessment = AssessmentRepo::find_by_convention(&self.pool, convention.id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Assessment of convention {}", convention.id)))?;

        let status_label = match assessment.status.as_str() {
            "COMPLETED" => "immersion réalisée",
            "PARTIALLY_COMPLETED" => "immersion réalisée en partie",
            _ => "le bénéficiaire ne s'est pas présenté",
        };
        let rendered = templates::assessment_created(&summary(&convention), status_label);

        Ok(agency
            .counsellor_emails
            .iter()
            .chain(agency.validator_emails.iter())
            .chain(std::iter::once(&convention.signatories.beneficiary.email))
            .map(|email| Outgoing::email(email, rendered.clone()))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Agencies and users
    // -----------------------------------------------------------------------

    async fn agency_notice(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let agency_id = payload_id(event, "agency_id")?;
        let agency = self.agency(agency_id).await?;

        let rendered = match event.topic {
            Topic::AgencyRegistered => templates::agency_registered(&agency.name),
            Topic::AgencyActivated => templates::agency_activated(&agency.name),
            Topic::AgencyRejected => {
                templates::agency_rejected(&agency.name, agency.rejection_justification.as_deref())
            }
            _ => templates::agency_closed(&agency.name),
        };

        Ok(agency
            .counsellor_emails
            .iter()
            .chain(agency.validator_emails.iter())
            .map(|email| Outgoing::email(email, rendered.clone()))
            .collect())
    }

    async fn agency_right_requested(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let user_id = payload_id(event, "user_id")?;
        let agency_id = payload_id(event, "agency_id")?;
        let user = UserRepo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("User {user_id}")))?;
        let agency = self.agency(agency_id).await?;

        let admins = AgencyRightRepo::list_admin_emails(&self.pool, agency_id).await?;
        if admins.is_empty() {
            tracing::debug!(agency_id, "No agency admin to notify of a right request");
        }
        let name = format!("{} {}", user.first_name, user.last_name);
        let rendered = templates::agency_right_requested(&name, &user.email, &agency.name);

        Ok(admins
            .iter()
            .map(|email| Outgoing::email(email, rendered.clone()))
            .collect())
    }

    async fn agency_rights_updated(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let user_id = payload_id(event, "user_id")?;
        let user = UserRepo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("User {user_id}")))?;
        Ok(vec![Outgoing::email(
            &user.email,
            templates::agency_rights_updated(&user.first_name),
        )])
    }

    // -----------------------------------------------------------------------
    // Establishments
    // -----------------------------------------------------------------------

    async fn establishment_notice(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let siret = event
            .payload_str("siret")
            .ok_or(DispatchError::MissingPayload("siret"))?;
        let establishment = EstablishmentRepo::find_by_siret(&self.pool, siret)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Establishment {siret}")))?;
        let name = establishment
            .business_name_customized
            .as_deref()
            .unwrap_or(&establishment.business_name);

        let rendered = match event.topic {
            Topic::FormEstablishmentAdded => templates::establishment_added(name),
            Topic::FormEstablishmentEdited => templates::establishment_edited(name),
            _ => {
                let token = generate_establishment_jwt(siret, &self.magic_links)?;
                let link = frontend_link(&self.frontend_base_url, "establishment/edit", &token);
                templates::establishment_edit_link(name, &link)
            }
        };
        Ok(vec![Outgoing::email(&establishment.business_contact.email, rendered)])
    }

    async fn contact_request(&self, event: &DomainEvent) -> Result<Vec<Outgoing>, DispatchError> {
        let discussion_id = payload_id(event, "discussion_id")?;
        let discussion = DiscussionRepo::find_by_id(&self.pool, discussion_id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Discussion {discussion_id}")))?;
        let establishment = EstablishmentRepo::find_by_siret(&self.pool, &discussion.siret)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Establishment {}", discussion.siret)))?;
        let job_label = EstablishmentRepo::find_offer(
            &self.pool,
            establishment.id,
            &discussion.appellation_code,
        )
        .await?
        .map(|offer| offer.appellation_label)
        .unwrap_or_else(|| discussion.appellation_code.clone());

        let contact = &establishment.business_contact;
        let candidate_name = format!(
            "{} {}",
            discussion.potential_beneficiary_first_name, discussion.potential_beneficiary_last_name
        );

        let message = match ContactMode::parse(&discussion.contact_mode) {
            Some(ContactMode::Email) => {
                let rendered = templates::contact_request_to_establishment(
                    &CandidateContact {
                        name: &candidate_name,
                        email: &discussion.potential_beneficiary_email,
                        phone: discussion.potential_beneficiary_phone.as_deref(),
                        message: discussion.message.as_deref().unwrap_or_default(),
                    },
                    &job_label,
                );
                Outgoing::Email(
                    EmailMessage::new(contact.email.to_lowercase(), rendered.subject, rendered.body)
                        .with_reply_to(discussion.potential_beneficiary_email.clone()),
                )
            }
            mode => {
                let how_to_reach = match mode {
                    Some(ContactMode::Phone) => format!("par téléphone au {}", contact.phone),
                    _ => format!(
                        "en vous présentant au {} {} {}",
                        establishment.street_address, establishment.postcode, establishment.city
                    ),
                };
                let contact_name = format!("{} {} ({})", contact.first_name, contact.last_name, contact.job);
                Outgoing::email(
                    &discussion.potential_beneficiary_email,
                    templates::contact_details_to_candidate(
                        &establishment.business_name,
                        &contact_name,
                        &how_to_reach,
                        &job_label,
                    ),
                )
            }
        };
        Ok(vec![message])
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    async fn convention(&self, event: &DomainEvent) -> Result<Convention, DispatchError> {
        let id = payload_id(event, "convention_id")?;
        ConventionRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Convention {id}")))
    }

    async fn agency(&self, id: DbId) -> Result<Agency, DispatchError> {
        AgencyRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| DispatchError::Gone(format!("Agency {id}")))
    }

    async fn emails_for(&self, convention: &Convention, role: Role) -> Result<Vec<String>, DispatchError> {
        let mut conn = self.pool.acquire().await?;
        party_emails(&mut conn, convention, role)
            .await
            .map_err(|e| DispatchError::Lookup(e.to_string()))
    }

    fn convention_link(
        &self,
        convention: &Convention,
        role: Role,
        email: &str,
    ) -> Result<String, DispatchError> {
        let token = generate_convention_jwt(convention.id, role, email, &self.magic_links)?;
        let path = match role {
            role if role.is_signatory() => "convention/sign",
            Role::Counsellor | Role::Validator | Role::BackOffice => "manage-convention",
            _ => "convention/view",
        };
        Ok(frontend_link(&self.frontend_base_url, path, &token))
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    async fn deliver(&self, message: &Outgoing) -> Result<(), String> {
        match message {
            Outgoing::Email(email) => self.email.send(email).await.map_err(|e| e.to_string()),
            Outgoing::Sms(sms) => self.sms.send(sms).await.map_err(|e| e.to_string()),
        }
    }

    async fn record(
        &self,
        event: &DomainEvent,
        message: &Outgoing,
        error: Option<String>,
    ) -> Result<(), sqlx::Error> {
        let (subject, body) = match message {
            Outgoing::Email(email) => (Some(email.subject.clone()), email.body.clone()),
            Outgoing::Sms(sms) => (None, sms.text.clone()),
        };
        NotificationRepo::record(
            &self.pool,
            &CreateNotification {
                outbox_id: Some(event.id),
                kind: message.kind(),
                topic: event.topic.as_str().to_string(),
                recipient: message.recipient(),
                subject,
                body,
                state: if error.is_none() { STATE_SENT } else { STATE_FAILED },
                error,
            },
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventSubscriber for NotificationDispatcher {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn handle(&self, event: &DomainEvent) -> Result<(), SubscriberError> {
        let messages = match self.build(event).await {
            Ok(messages) => messages,
            Err(DispatchError::Gone(what)) => {
                tracing::warn!(
                    event_id = event.id,
                    topic = %event.topic,
                    "{what} no longer exists, nothing to notify",
                );
                return Ok(());
            }
            Err(e) => return Err(SubscriberError::new(e.to_string())),
        };

        let already_sent: HashSet<(String, String)> =
            NotificationRepo::sent_recipients(&self.pool, event.id)
                .await
                .map_err(|e| SubscriberError::new(e.to_string()))?
                .into_iter()
                .collect();

        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        for message in &messages {
            let key = (message.kind().to_string(), message.recipient());
            if already_sent.contains(&key) || !seen.insert(key) {
                continue;
            }

            let error = self.deliver(message).await.err();
            if let Some(e) = &error {
                tracing::warn!(
                    event_id = event.id,
                    kind = message.kind(),
                    error = %e,
                    "Notification delivery failed",
                );
                failures.push(e.clone());
            }
            self.record(event, message, error)
                .await
                .map_err(|e| SubscriberError::new(e.to_string()))?;
        }

        if failures.is_empty() {
            tracing::debug!(
                event_id = event.id,
                topic = %event.topic,
                sent = seen.len(),
                "Notifications sent",
            );
            Ok(())
        } else {
            Err(SubscriberError::new(format!(
                "{} notification(s) failed: {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn payload_id(event: &DomainEvent, key: &'static str) -> Result<DbId, DispatchError> {
    event.payload_id(key).ok_or(DispatchError::MissingPayload(key))
}

fn payload_role(event: &DomainEvent) -> Result<Role, DispatchError> {
    event
        .payload_str("role")
        .and_then(Role::parse)
        .ok_or(DispatchError::MissingPayload("role"))
}

fn summary(convention: &Convention) -> ConventionSummary<'_> {
    ConventionSummary {
        beneficiary_name: &convention.signatories.beneficiary.last_name,
        business_name: &convention.business_name,
        job_label: &convention.immersion_appellation.appellation_label,
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Beneficiary => "bénéficiaire",
        Role::BeneficiaryRepresentative => "représentant légal du bénéficiaire",
        Role::BeneficiaryCurrentEmployer => "employeur actuel du bénéficiaire",
        Role::EstablishmentRepresentative => "représentant de l'entreprise",
        Role::EstablishmentTutor => "tuteur",
        Role::Counsellor => "conseiller",
        Role::Validator => "valideur",
        Role::AgencyViewer | Role::AgencyAdmin => "membre de la structure",
        Role::BackOffice => "administrateur",
    }
}

/// French mobile numbers start with 06 or 07.
fn is_mobile(phone: &str) -> bool {
    to_international(phone).is_ok_and(|intl| intl.starts_with("336") || intl.starts_with("337"))
}
