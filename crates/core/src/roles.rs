//! Roles that can act on a convention or an agency.
//!
//! Signatory roles come from magic links; agency roles come from a connected
//! user's rights on an agency. `back-office` is granted to platform admins.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum Role {
    Beneficiary,
    BeneficiaryRepresentative,
    BeneficiaryCurrentEmployer,
    EstablishmentRepresentative,
    EstablishmentTutor,
    Counsellor,
    Validator,
    AgencyViewer,
    AgencyAdmin,
    BackOffice,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 10] = [
        Role::Beneficiary,
        Role::BeneficiaryRepresentative,
        Role::BeneficiaryCurrentEmployer,
        Role::EstablishmentRepresentative,
        Role::EstablishmentTutor,
        Role::Counsellor,
        Role::Validator,
        Role::AgencyViewer,
        Role::AgencyAdmin,
        Role::BackOffice,
    ];

    /// Roles whose holders sign the convention.
    pub const SIGNATORIES: [Role; 4] = [
        Role::Beneficiary,
        Role::BeneficiaryRepresentative,
        Role::BeneficiaryCurrentEmployer,
        Role::EstablishmentRepresentative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beneficiary => "beneficiary",
            Self::BeneficiaryRepresentative => "beneficiary-representative",
            Self::BeneficiaryCurrentEmployer => "beneficiary-current-employer",
            Self::EstablishmentRepresentative => "establishment-representative",
            Self::EstablishmentTutor => "establishment-tutor",
            Self::Counsellor => "counsellor",
            Self::Validator => "validator",
            Self::AgencyViewer => "agency-viewer",
            Self::AgencyAdmin => "agency-admin",
            Self::BackOffice => "back-office",
        }
    }

    /// Parse a role name. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    pub fn is_signatory(&self) -> bool {
        Self::SIGNATORIES.contains(self)
    }

    /// Roles held by agency staff (as opposed to convention parties).
    pub fn is_agency_role(&self) -> bool {
        matches!(
            self,
            Self::Counsellor | Self::Validator | Self::AgencyViewer | Self::AgencyAdmin
        )
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Agency rights
// ---------------------------------------------------------------------------

/// Role stored in `user_agency_rights.role`.
///
/// `to-review` marks a pending request that grants no access yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum AgencyRightRole {
    Counsellor,
    Validator,
    AgencyViewer,
    AgencyAdmin,
    ToReview,
}

impl AgencyRightRole {
    pub const ALL: [AgencyRightRole; 5] = [
        AgencyRightRole::Counsellor,
        AgencyRightRole::Validator,
        AgencyRightRole::AgencyViewer,
        AgencyRightRole::AgencyAdmin,
        AgencyRightRole::ToReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counsellor => "counsellor",
            Self::Validator => "validator",
            Self::AgencyViewer => "agency-viewer",
            Self::AgencyAdmin => "agency-admin",
            Self::ToReview => "to-review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }

    /// The convention role this right acts with, if it grants any access.
    pub fn as_role(&self) -> Option<Role> {
        match self {
            Self::Counsellor => Some(Role::Counsellor),
            Self::Validator => Some(Role::Validator),
            Self::AgencyViewer => Some(Role::AgencyViewer),
            Self::AgencyAdmin => Some(Role::AgencyAdmin),
            Self::ToReview => None,
        }
    }
}

impl std::fmt::Display for AgencyRightRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_round_trips_through_its_name() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn signatories_are_the_four_signing_parties() {
        assert!(Role::Beneficiary.is_signatory());
        assert!(Role::EstablishmentRepresentative.is_signatory());
        assert!(!Role::EstablishmentTutor.is_signatory());
        assert!(!Role::Validator.is_signatory());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&Role::BeneficiaryCurrentEmployer).unwrap();
        assert_eq!(json, "\"beneficiary-current-employer\"");
    }

    #[test]
    fn to_review_right_grants_no_role() {
        assert_eq!(AgencyRightRole::ToReview.as_role(), None);
        assert_eq!(AgencyRightRole::Validator.as_role(), Some(Role::Validator));
        assert_eq!(AgencyRightRole::parse("to-review"), Some(AgencyRightRole::ToReview));
    }
}
