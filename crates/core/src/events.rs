//! Domain event topics written to the outbox.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::convention_status::ConventionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Topic {
    ConventionSubmitted,
    ConventionPartiallySigned,
    ConventionFullySigned,
    ConventionAcceptedByCounsellor,
    ConventionAcceptedByValidator,
    ConventionRejected,
    ConventionCancelled,
    ConventionDeprecated,
    ConventionRequiresModification,
    MagicLinkRenewalRequested,
    AgencyRegistered,
    AgencyActivated,
    AgencyRejected,
    AgencyClosed,
    FormEstablishmentAdded,
    FormEstablishmentEdited,
    EstablishmentEditLinkRequested,
    ContactRequestedByBeneficiary,
    AssessmentCreated,
    AgencyRightRequested,
    AgencyRightsUpdated,
}

impl Topic {
    pub const ALL: [Topic; 21] = [
        Topic::ConventionSubmitted,
        Topic::ConventionPartiallySigned,
        Topic::ConventionFullySigned,
        Topic::ConventionAcceptedByCounsellor,
        Topic::ConventionAcceptedByValidator,
        Topic::ConventionRejected,
        Topic::ConventionCancelled,
        Topic::ConventionDeprecated,
        Topic::ConventionRequiresModification,
        Topic::MagicLinkRenewalRequested,
        Topic::AgencyRegistered,
        Topic::AgencyActivated,
        Topic::AgencyRejected,
        Topic::AgencyClosed,
        Topic::FormEstablishmentAdded,
        Topic::FormEstablishmentEdited,
        Topic::EstablishmentEditLinkRequested,
        Topic::ContactRequestedByBeneficiary,
        Topic::AssessmentCreated,
        Topic::AgencyRightRequested,
        Topic::AgencyRightsUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConventionSubmitted => "ConventionSubmitted",
            Self::ConventionPartiallySigned => "ConventionPartiallySigned",
            Self::ConventionFullySigned => "ConventionFullySigned",
            Self::ConventionAcceptedByCounsellor => "ConventionAcceptedByCounsellor",
            Self::ConventionAcceptedByValidator => "ConventionAcceptedByValidator",
            Self::ConventionRejected => "ConventionRejected",
            Self::ConventionCancelled => "ConventionCancelled",
            Self::ConventionDeprecated => "ConventionDeprecated",
            Self::ConventionRequiresModification => "ConventionRequiresModification",
            Self::MagicLinkRenewalRequested => "MagicLinkRenewalRequested",
            Self::AgencyRegistered => "AgencyRegistered",
            Self::AgencyActivated => "AgencyActivated",
            Self::AgencyRejected => "AgencyRejected",
            Self::AgencyClosed => "AgencyClosed",
            Self::FormEstablishmentAdded => "FormEstablishmentAdded",
            Self::FormEstablishmentEdited => "FormEstablishmentEdited",
            Self::EstablishmentEditLinkRequested => "EstablishmentEditLinkRequested",
            Self::ContactRequestedByBeneficiary => "ContactRequestedByBeneficiary",
            Self::AssessmentCreated => "AssessmentCreated",
            Self::AgencyRightRequested => "AgencyRightRequested",
            Self::AgencyRightsUpdated => "AgencyRightsUpdated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| topic.as_str() == s)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The topic announcing that a convention reached `status`.
///
/// `READY_TO_SIGN` is reached on submission and on re-submission after a
/// modification request; both ask the signatories to sign again.
pub fn topic_for_status(status: ConventionStatus) -> Topic {
    match status {
        ConventionStatus::Draft => Topic::ConventionRequiresModification,
        ConventionStatus::ReadyToSign => Topic::ConventionSubmitted,
        ConventionStatus::PartiallySigned => Topic::ConventionPartiallySigned,
        ConventionStatus::InReview => Topic::ConventionFullySigned,
        ConventionStatus::AcceptedByCounsellor => Topic::ConventionAcceptedByCounsellor,
        ConventionStatus::AcceptedByValidator => Topic::ConventionAcceptedByValidator,
        ConventionStatus::Rejected => Topic::ConventionRejected,
        ConventionStatus::Cancelled => Topic::ConventionCancelled,
        ConventionStatus::Deprecated => Topic::ConventionDeprecated,
    }
}
