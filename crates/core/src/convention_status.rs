//! Convention lifecycle statuses and the role-gated transition table.
//!
//! Each target status lists the statuses it may be reached from and the
//! roles allowed to perform the move. The table is the single source of
//! truth for both the API layer and the tests.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;
use crate::roles::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ConventionStatus {
    Draft,
    ReadyToSign,
    PartiallySigned,
    InReview,
    AcceptedByCounsellor,
    AcceptedByValidator,
    Rejected,
    Cancelled,
    Deprecated,
}

impl ConventionStatus {
    pub const ALL: [ConventionStatus; 9] = [
        ConventionStatus::Draft,
        ConventionStatus::ReadyToSign,
        ConventionStatus::PartiallySigned,
        ConventionStatus::InReview,
        ConventionStatus::AcceptedByCounsellor,
        ConventionStatus::AcceptedByValidator,
        ConventionStatus::Rejected,
        ConventionStatus::Cancelled,
        ConventionStatus::Deprecated,
    ];

    /// Return the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::ReadyToSign => "READY_TO_SIGN",
            Self::PartiallySigned => "PARTIALLY_SIGNED",
            Self::InReview => "IN_REVIEW",
            Self::AcceptedByCounsellor => "ACCEPTED_BY_COUNSELLOR",
            Self::AcceptedByValidator => "ACCEPTED_BY_VALIDATOR",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Deprecated => "DEPRECATED",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Statuses in which signatories may still edit the convention.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::ReadyToSign)
    }

    /// Statuses in which a signatory may add a signature.
    pub fn accepts_signatures(&self) -> bool {
        matches!(self, Self::ReadyToSign | Self::PartiallySigned)
    }

    /// No transition leaves these statuses.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Deprecated)
    }
}

impl std::fmt::Display for ConventionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Allowed origins and roles for reaching one target status.
#[derive(Debug)]
pub struct TransitionRule {
    pub target: ConventionStatus,
    pub valid_initial_statuses: &'static [ConventionStatus],
    pub allowed_roles: &'static [Role],
}

use ConventionStatus as S;

const SIGNATORIES: &[Role] = &[
    Role::Beneficiary,
    Role::BeneficiaryRepresentative,
    Role::BeneficiaryCurrentEmployer,
    Role::EstablishmentRepresentative,
];

const ALL_PARTIES: &[Role] = &[
    Role::Beneficiary,
    Role::BeneficiaryRepresentative,
    Role::BeneficiaryCurrentEmployer,
    Role::EstablishmentRepresentative,
    Role::EstablishmentTutor,
    Role::Counsellor,
    Role::Validator,
    Role::BackOffice,
];

const REVIEWERS: &[Role] = &[Role::Counsellor, Role::Validator, Role::BackOffice];

const PENDING_REVIEW: &[ConventionStatus] = &[
    S::ReadyToSign,
    S::PartiallySigned,
    S::InReview,
    S::AcceptedByCounsellor,
];

const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        target: S::ReadyToSign,
        valid_initial_statuses: &[S::Draft, S::ReadyToSign],
        allowed_roles: ALL_PARTIES,
    },
    TransitionRule {
        target: S::PartiallySigned,
        valid_initial_statuses: &[S::ReadyToSign, S::PartiallySigned],
        allowed_roles: SIGNATORIES,
    },
    TransitionRule {
        target: S::InReview,
        valid_initial_statuses: &[S::ReadyToSign, S::PartiallySigned],
        allowed_roles: SIGNATORIES,
    },
    TransitionRule {
        target: S::AcceptedByCounsellor,
        valid_initial_statuses: &[S::InReview],
        allowed_roles: &[Role::Counsellor],
    },
    TransitionRule {
        target: S::AcceptedByValidator,
        valid_initial_statuses: &[S::InReview, S::AcceptedByCounsellor],
        allowed_roles: &[Role::Validator, Role::BackOffice],
    },
    TransitionRule {
        target: S::Rejected,
        valid_initial_statuses: PENDING_REVIEW,
        allowed_roles: REVIEWERS,
    },
    TransitionRule {
        target: S::Cancelled,
        valid_initial_statuses: &[S::AcceptedByValidator],
        allowed_roles: REVIEWERS,
    },
    TransitionRule {
        target: S::Draft,
        valid_initial_statuses: PENDING_REVIEW,
        allowed_roles: ALL_PARTIES,
    },
    TransitionRule {
        target: S::Deprecated,
        valid_initial_statuses: PENDING_REVIEW,
        allowed_roles: REVIEWERS,
    },
];

/// Look up the rule for reaching `target`.
pub fn transition_rule(target: ConventionStatus) -> &'static TransitionRule {
    TRANSITIONS
        .iter()
        .find(|rule| rule.target == target)
        .unwrap_or_else(|| unreachable!("every status has a transition rule"))
}

/// Agency-dependent facts that refine the table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    /// The agency refers conventions to another agency, so a counsellor must
    /// accept before the validator.
    pub requires_counsellor_review: bool,
}

/// Pure table lookup: is `role` allowed to move a convention from `from` to `to`?
pub fn is_transition_allowed(from: ConventionStatus, to: ConventionStatus, role: Role) -> bool {
    let rule = transition_rule(to);
    rule.valid_initial_statuses.contains(&from) && rule.allowed_roles.contains(&role)
}

/// Validate a transition, returning the error the API should surface.
///
/// - origin status not allowed -> [`CoreError::Validation`]
/// - role not allowed -> [`CoreError::Forbidden`]
pub fn check_transition(
    from: ConventionStatus,
    to: ConventionStatus,
    role: Role,
    ctx: TransitionContext,
) -> Result<(), CoreError> {
    let rule = transition_rule(to);

    if !rule.valid_initial_statuses.contains(&from) {
        return Err(CoreError::Validation(format!(
            "Cannot go from status '{from}' to '{to}'"
        )));
    }

    if !rule.allowed_roles.contains(&role) {
        return Err(CoreError::Forbidden(format!(
            "Role '{role}' is not allowed to go from status '{from}' to '{to}'"
        )));
    }

    if ctx.requires_counsellor_review
        && to == S::AcceptedByValidator
        && from == S::InReview
    {
        return Err(CoreError::Validation(
            "This convention must be reviewed by a counsellor before validation".into(),
        ));
    }

    Ok(())
}

/// Target statuses that must carry a non-empty justification.
pub fn requires_justification(to: ConventionStatus) -> bool {
    matches!(to, S::Rejected | S::Cancelled | S::Draft | S::Deprecated)
}

/// Validate the justification requirement for `to`.
pub fn check_justification(to: ConventionStatus, justification: Option<&str>) -> Result<(), CoreError> {
    let present = justification.is_some_and(|j| !j.trim().is_empty());
    if requires_justification(to) && !present {
        return Err(CoreError::Validation(format!(
            "A justification is required to move a convention to '{to}'"
        )));
    }
    Ok(())
}

/// Status reached once a signature has been added.
pub fn status_after_signature(signed: usize, required: usize) -> ConventionStatus {
    if signed >= required {
        S::InReview
    } else {
        S::PartiallySigned
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    /// Expected allow list, written out independently of `TRANSITIONS`.
    fn expected_allowed(from: ConventionStatus, to: ConventionStatus, role: Role) -> bool {
        let signatory = role.is_signatory();
        let party = signatory
            || matches!(
                role,
                Role::EstablishmentTutor | Role::Counsellor | Role::Validator | Role::BackOffice
            );
        let reviewer = matches!(role, Role::Counsellor | Role::Validator | Role::BackOffice);
        let pending = matches!(
            from,
            S::ReadyToSign | S::PartiallySigned | S::InReview | S::AcceptedByCounsellor
        );

        match to {
            S::ReadyToSign => party && matches!(from, S::Draft | S::ReadyToSign),
            S::PartiallySigned | S::InReview => {
                signatory && matches!(from, S::ReadyToSign | S::PartiallySigned)
            }
            S::AcceptedByCounsellor => role == Role::Counsellor && from == S::InReview,
            S::AcceptedByValidator => {
                matches!(role, Role::Validator | Role::BackOffice)
                    && matches!(from, S::InReview | S::AcceptedByCounsellor)
            }
            S::Rejected | S::Deprecated => reviewer && pending,
            S::Cancelled => reviewer && from == S::AcceptedByValidator,
            S::Draft => party && pending,
        }
    }

    #[test]
    fn table_matches_expectation_for_every_status_and_role() {
        for from in ConventionStatus::ALL {
            for to in ConventionStatus::ALL {
                for role in Role::ALL {
                    assert_eq!(
                        is_transition_allowed(from, to, role),
                        expected_allowed(from, to, role),
                        "{from} -> {to} as {role}"
                    );
                }
            }
        }
    }

    #[test]
    fn every_status_has_exactly_one_rule() {
        for status in ConventionStatus::ALL {
            let count = TRANSITIONS.iter().filter(|r| r.target == status).count();
            assert_eq!(count, 1, "status {status}");
        }
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_transition() {
        for from in ConventionStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ConventionStatus::ALL {
                for role in Role::ALL {
                    assert!(!is_transition_allowed(from, to, role));
                }
            }
        }
    }

    #[test]
    fn agency_viewer_and_admin_cannot_change_status() {
        for from in ConventionStatus::ALL {
            for to in ConventionStatus::ALL {
                assert!(!is_transition_allowed(from, to, Role::AgencyViewer));
                assert!(!is_transition_allowed(from, to, Role::AgencyAdmin));
            }
        }
    }

    #[test]
    fn wrong_origin_is_a_validation_error() {
        let result = check_transition(
            S::Draft,
            S::AcceptedByValidator,
            Role::Validator,
            TransitionContext::default(),
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn wrong_role_is_forbidden() {
        let result = check_transition(
            S::InReview,
            S::AcceptedByValidator,
            Role::Beneficiary,
            TransitionContext::default(),
        );
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn two_step_agency_needs_counsellor_first() {
        let ctx = TransitionContext {
            requires_counsellor_review: true,
        };
        assert_matches!(
            check_transition(S::InReview, S::AcceptedByValidator, Role::Validator, ctx),
            Err(CoreError::Validation(_))
        );
        assert!(check_transition(S::InReview, S::AcceptedByCounsellor, Role::Counsellor, ctx).is_ok());
        assert!(
            check_transition(S::AcceptedByCounsellor, S::AcceptedByValidator, Role::Validator, ctx)
                .is_ok()
        );
    }

    #[test]
    fn rejection_requires_justification() {
        assert!(check_justification(S::Rejected, None).is_err());
        assert!(check_justification(S::Rejected, Some("   ")).is_err());
        assert!(check_justification(S::Rejected, Some("Dates incohérentes")).is_ok());
        assert!(check_justification(S::AcceptedByValidator, None).is_ok());
    }

    #[test]
    fn signature_moves_to_in_review_once_complete() {
        assert_eq!(status_after_signature(1, 2), S::PartiallySigned);
        assert_eq!(status_after_signature(2, 2), S::InReview);
    }

    #[test]
    fn status_names_round_trip() {
        for status in ConventionStatus::ALL {
            assert_eq!(ConventionStatus::parse(status.as_str()), Some(status));
        }
        let json = serde_json::to_string(&S::AcceptedByCounsellor).unwrap();
        assert_eq!(json, "\"ACCEPTED_BY_COUNSELLOR\"");
    }
}
