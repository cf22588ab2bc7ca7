//! Single policy-evaluation point for role/status gating. Route handlers and
//! activities ask this function instead of scattering role conditionals.

use crate::common::UserRole;
use crate::domains::signatures::SignatureSummary;

use super::machines::Status;

/// Everything a caller may attempt against an approval package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    EditLines,
    EditComment,
    SignOfficer,
    SignManager,
    RevokeOfficer,
    RevokeManager,
    Submit,
    RecordInvitations,
    RecordManualEntry,
    RequestApproval,
    ManagerApprove,
    ManagerReject,
    ManagerReturn,
    ManagerArchive,
    SubmitChanges,
    ApproveChanges,
    RejectChanges,
    Close,
    RecordSubmission,
    ForceRelease,
}

/// Can a caller with `roles` perform `action` given the subject's status and
/// the current signature state? Pure; independently testable.
pub fn can_perform(
    action: PolicyAction,
    status: Status,
    roles: &[UserRole],
    signatures: &SignatureSummary,
) -> bool {
    use PolicyAction as P;

    let officer = roles.contains(&UserRole::Officer);
    let manager = roles.contains(&UserRole::Manager);
    let admin = roles.contains(&UserRole::Admin);

    match action {
        // Line edits: officers only while nothing is signed; a manager may
        // still adjust final prices (their lines) until the package archives.
        P::EditLines => {
            !status.is_archived() && ((officer && !signatures.any_active) || manager)
        }

        // The very first signature locks the comment until a full reset.
        P::EditComment => !status.is_archived() && !signatures.any_active,

        P::SignOfficer => officer && matches!(status, Status::ApprovalPending),
        P::SignManager => {
            manager && matches!(status, Status::ApprovalPending | Status::SignatureReady)
        }
        P::RevokeOfficer => officer && !status.is_archived(),
        P::RevokeManager => manager && !status.is_archived(),

        P::Submit => {
            officer && matches!(status, Status::Draft | Status::RequisitionReturned)
        }
        P::RecordInvitations | P::RecordManualEntry => {
            officer && matches!(status, Status::Submitted)
        }
        P::RequestApproval => {
            officer && matches!(status, Status::InvitationsSent | Status::ManualEntry)
        }

        P::ManagerApprove => manager && matches!(status, Status::SignatureReady),
        P::ManagerReject | P::ManagerReturn => {
            manager && matches!(status, Status::ApprovalPending | Status::SignatureReady)
        }
        P::ManagerArchive => manager && !status.is_archived(),

        P::SubmitChanges => {
            officer && matches!(status, Status::TenderReady | Status::PurchaseReady)
        }
        P::ApproveChanges | P::RejectChanges => {
            manager && matches!(status, Status::ChangesSubmitted)
        }
        P::Close => {
            manager
                && matches!(
                    status,
                    Status::TenderReady
                        | Status::PurchaseReady
                        | Status::ChangesApproved
                        | Status::ChangesRejected
                )
        }

        P::RecordSubmission => {
            officer && matches!(status, Status::InvitationsSent | Status::ManualEntry)
        }

        P::ForceRelease => admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;

    fn no_signatures() -> SignatureSummary {
        SignatureSummary {
            required_officers: vec![UserId::new()],
            signed_officers: vec![],
            manager_signed: false,
            any_active: false,
        }
    }

    fn one_signature() -> SignatureSummary {
        let officer = UserId::new();
        SignatureSummary {
            required_officers: vec![officer],
            signed_officers: vec![officer],
            manager_signed: false,
            any_active: true,
        }
    }

    const OFFICER: &[UserRole] = &[UserRole::Officer];
    const MANAGER: &[UserRole] = &[UserRole::Manager];
    const ADMIN: &[UserRole] = &[UserRole::Admin];

    #[test]
    fn officer_line_edits_blocked_by_any_signature() {
        let status = Status::ApprovalPending;
        assert!(can_perform(PolicyAction::EditLines, status, OFFICER, &no_signatures()));
        assert!(!can_perform(PolicyAction::EditLines, status, OFFICER, &one_signature()));
        // Manager lines stay editable after officer sign-off.
        assert!(can_perform(PolicyAction::EditLines, status, MANAGER, &one_signature()));
    }

    #[test]
    fn comment_locked_by_first_signature_for_everyone() {
        let status = Status::ApprovalPending;
        for roles in [OFFICER, MANAGER, ADMIN] {
            assert!(!can_perform(PolicyAction::EditComment, status, roles, &one_signature()));
        }
        assert!(can_perform(PolicyAction::EditComment, status, OFFICER, &no_signatures()));
    }

    #[test]
    fn signing_is_role_gated() {
        let s = no_signatures();
        assert!(can_perform(PolicyAction::SignOfficer, Status::ApprovalPending, OFFICER, &s));
        assert!(!can_perform(PolicyAction::SignOfficer, Status::ApprovalPending, MANAGER, &s));
        assert!(can_perform(PolicyAction::SignManager, Status::SignatureReady, MANAGER, &s));
        assert!(!can_perform(PolicyAction::SignManager, Status::Draft, MANAGER, &s));
    }

    #[test]
    fn force_release_is_admin_only() {
        let s = no_signatures();
        assert!(can_perform(PolicyAction::ForceRelease, Status::Draft, ADMIN, &s));
        assert!(!can_perform(PolicyAction::ForceRelease, Status::Draft, MANAGER, &s));
        assert!(!can_perform(PolicyAction::ForceRelease, Status::Draft, OFFICER, &s));
    }

    #[test]
    fn nothing_is_editable_once_archived() {
        let s = no_signatures();
        for status in [Status::RequisitionRejected, Status::Closed] {
            assert!(!can_perform(PolicyAction::EditLines, status, MANAGER, &s));
            assert!(!can_perform(PolicyAction::EditComment, status, OFFICER, &s));
            assert!(!can_perform(PolicyAction::ManagerArchive, status, MANAGER, &s));
        }
    }
}
