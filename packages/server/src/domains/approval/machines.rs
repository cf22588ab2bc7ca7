//! The pure approval state machine. No I/O here: guards read a context
//! assembled by the activities layer, and every illegal move is a typed error
//! naming the blocking condition.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::WorkflowError;
use crate::domains::locking::LockLease;
use crate::domains::signatures::SignatureSummary;

use super::models::ApprovalLine;

/// Requisition lifecycle status, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Draft,
    Submitted,
    InvitationsSent,
    ManualEntry,
    ApprovalPending,
    SignatureReady,
    TenderReady,
    PurchaseReady,
    Closed,
    ChangesSubmitted,
    ChangesApproved,
    ChangesRejected,
    RequisitionRejected,
    RequisitionReturned,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::InvitationsSent => "INVITATIONS_SENT",
            Self::ManualEntry => "MANUAL_ENTRY",
            Self::ApprovalPending => "APPROVAL_PENDING",
            Self::SignatureReady => "SIGNATURE_READY",
            Self::TenderReady => "TENDER_READY",
            Self::PurchaseReady => "PURCHASE_READY",
            Self::Closed => "CLOSED",
            Self::ChangesSubmitted => "CHANGES_SUBMITTED",
            Self::ChangesApproved => "CHANGES_APPROVED",
            Self::ChangesRejected => "CHANGES_REJECTED",
            Self::RequisitionRejected => "REQUISITION_REJECTED",
            Self::RequisitionReturned => "REQUISITION_RETURNED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "DRAFT" => Self::Draft,
            "SUBMITTED" => Self::Submitted,
            "INVITATIONS_SENT" => Self::InvitationsSent,
            "MANUAL_ENTRY" => Self::ManualEntry,
            "APPROVAL_PENDING" => Self::ApprovalPending,
            "SIGNATURE_READY" => Self::SignatureReady,
            "TENDER_READY" => Self::TenderReady,
            "PURCHASE_READY" => Self::PurchaseReady,
            "CLOSED" => Self::Closed,
            "CHANGES_SUBMITTED" => Self::ChangesSubmitted,
            "CHANGES_APPROVED" => Self::ChangesApproved,
            "CHANGES_REJECTED" => Self::ChangesRejected,
            "REQUISITION_REJECTED" => Self::RequisitionRejected,
            "REQUISITION_RETURNED" => Self::RequisitionReturned,
            _ => return None,
        })
    }

    /// Archived subjects accept no further edits or signatures.
    pub const fn is_archived(&self) -> bool {
        matches!(self, Self::RequisitionRejected | Self::Closed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Status {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown approval status: {value}"))
    }
}

/// Transitions a caller can request. Signature writes themselves live in the
/// ledger; `MarkSignatureReady` is the machine-side consequence of the last
/// officer signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Submit,
    RecordInvitations,
    RecordManualEntry,
    RequestApproval,
    MarkSignatureReady,
    ManagerApprove,
    ManagerReject,
    ManagerReturn,
    ManagerArchive,
    SubmitChanges,
    ApproveChanges,
    RejectChanges,
    Close,
}

impl Action {
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::RecordInvitations => "record invitations",
            Self::RecordManualEntry => "record manual entry",
            Self::RequestApproval => "request approval",
            Self::MarkSignatureReady => "mark signature-ready",
            Self::ManagerApprove => "approve",
            Self::ManagerReject => "reject",
            Self::ManagerReturn => "return",
            Self::ManagerArchive => "archive",
            Self::SubmitChanges => "submit changes",
            Self::ApproveChanges => "approve changes",
            Self::RejectChanges => "reject changes",
            Self::Close => "close",
        }
    }
}

/// Everything a guard may consult, assembled by the caller.
pub struct GuardContext<'a> {
    pub signatures: &'a SignatureSummary,
    /// Active lease on the package held by someone other than the caller.
    pub conflicting_lock: Option<&'a LockLease>,
    /// Whether the caller currently holds the package lease.
    pub holds_lease: bool,
    pub grand_total: Decimal,
    pub tender_threshold: Decimal,
}

impl GuardContext<'_> {
    fn require_lease(&self, action: Action) -> Result<(), WorkflowError> {
        if self.holds_lease {
            return Ok(());
        }
        match self.conflicting_lock {
            Some(lease) => Err(WorkflowError::LockConflict {
                owner_id: lease.owner_id,
                owner_name: lease.owner_name.clone(),
            }),
            None => Err(WorkflowError::Forbidden(format!(
                "acquire the edit lease before attempting to {}",
                action.verb()
            ))),
        }
    }
}

/// Apply one transition, or explain exactly why it is illegal.
pub fn apply(status: Status, action: Action, ctx: &GuardContext) -> Result<Status, WorkflowError> {
    use Action as A;
    use Status as S;

    let next = match (status, action) {
        // Submit mutates editable content (it freezes the draft), so the
        // caller must hold the lease. Returned requisitions loop back here.
        (S::Draft | S::RequisitionReturned, A::Submit) => {
            ctx.require_lease(action)?;
            S::Submitted
        }

        (S::Submitted, A::RecordInvitations) => S::InvitationsSent,
        (S::Submitted, A::RecordManualEntry) => S::ManualEntry,

        (S::InvitationsSent | S::ManualEntry, A::RequestApproval) => S::ApprovalPending,

        // The gate into SIGNATURE_READY: every required officer signed and
        // unrevoked, and nobody else mid-edit on the package.
        (S::ApprovalPending, A::MarkSignatureReady) => {
            let missing = ctx.signatures.missing_officers();
            if !missing.is_empty() {
                return Err(WorkflowError::OrderingViolation { missing });
            }
            if let Some(lease) = ctx.conflicting_lock {
                return Err(WorkflowError::LockConflict {
                    owner_id: lease.owner_id,
                    owner_name: lease.owner_name.clone(),
                });
            }
            S::SignatureReady
        }

        // Threshold selects the downstream path: at or above goes to full
        // tender, below takes the lighter purchase route.
        (S::SignatureReady, A::ManagerApprove) => {
            if !ctx.signatures.manager_signed {
                return Err(WorkflowError::Forbidden(
                    "manager signature required before approval".to_string(),
                ));
            }
            if ctx.grand_total >= ctx.tender_threshold {
                S::TenderReady
            } else {
                S::PurchaseReady
            }
        }

        // Irreversible.
        (S::ApprovalPending | S::SignatureReady, A::ManagerReject) => S::RequisitionRejected,

        // Loops back toward officer editing; the note is persisted verbatim
        // by the activity layer.
        (S::ApprovalPending | S::SignatureReady, A::ManagerReturn) => S::RequisitionReturned,

        (current, A::ManagerArchive) if !current.is_archived() => S::RequisitionRejected,

        (S::TenderReady | S::PurchaseReady, A::SubmitChanges) => S::ChangesSubmitted,
        (S::ChangesSubmitted, A::ApproveChanges) => S::ChangesApproved,
        (S::ChangesSubmitted, A::RejectChanges) => S::ChangesRejected,

        (
            S::TenderReady | S::PurchaseReady | S::ChangesApproved | S::ChangesRejected,
            A::Close,
        ) => S::Closed,

        (current, action) => {
            return Err(WorkflowError::InvalidTransition {
                status: current.to_string(),
                action: action.verb(),
            })
        }
    };

    Ok(next)
}

/// Grand total over lines where both quantity and final unit price are set.
/// Incomplete lines are skipped, not treated as zero-priced.
pub fn grand_total(lines: &[ApprovalLine]) -> Decimal {
    lines
        .iter()
        .filter_map(|line| Some(line.quantity? * line.final_unit_price?))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{LeaseId, UserId};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn summary(missing: usize, manager_signed: bool) -> SignatureSummary {
        let required: Vec<UserId> = (0..3).map(|_| UserId::new()).collect();
        let signed = required[..3 - missing].to_vec();
        SignatureSummary {
            required_officers: required,
            signed_officers: signed,
            manager_signed,
            any_active: manager_signed,
        }
    }

    fn ctx<'a>(signatures: &'a SignatureSummary, holds_lease: bool) -> GuardContext<'a> {
        GuardContext {
            signatures,
            conflicting_lock: None,
            holds_lease,
            grand_total: Decimal::ZERO,
            tender_threshold: Decimal::from(50_000),
        }
    }

    fn other_lease() -> LockLease {
        let now = Utc::now();
        LockLease {
            id: LeaseId::new(),
            resource_type: "requisition".to_string(),
            resource_id: Uuid::new_v4(),
            scope: "approval-package".to_string(),
            owner_id: UserId::new(),
            owner_name: "someone else".to_string(),
            acquired_at: now,
            last_heartbeat_at: now,
            expires_at: now + Duration::seconds(90),
        }
    }

    #[test]
    fn submit_requires_the_lease() {
        let s = summary(3, false);
        let denied = apply(Status::Draft, Action::Submit, &ctx(&s, false));
        assert!(matches!(denied, Err(WorkflowError::Forbidden(_))));

        let allowed = apply(Status::Draft, Action::Submit, &ctx(&s, true));
        assert_eq!(allowed.unwrap(), Status::Submitted);
    }

    #[test]
    fn submit_names_the_holder_when_someone_else_edits() {
        let s = summary(3, false);
        let lease = other_lease();
        let guard = GuardContext {
            conflicting_lock: Some(&lease),
            ..ctx(&s, false)
        };
        match apply(Status::Draft, Action::Submit, &guard) {
            Err(WorkflowError::LockConflict { owner_id, .. }) => {
                assert_eq!(owner_id, lease.owner_id)
            }
            other => panic!("expected LockConflict, got {other:?}"),
        }
    }

    #[test]
    fn signature_ready_blocked_until_officers_complete() {
        let s = summary(1, false);
        let denied = apply(Status::ApprovalPending, Action::MarkSignatureReady, &ctx(&s, false));
        match denied {
            Err(WorkflowError::OrderingViolation { missing }) => assert_eq!(missing.len(), 1),
            other => panic!("expected OrderingViolation, got {other:?}"),
        }

        let s = summary(0, false);
        let next = apply(Status::ApprovalPending, Action::MarkSignatureReady, &ctx(&s, false));
        assert_eq!(next.unwrap(), Status::SignatureReady);
    }

    #[test]
    fn signature_ready_blocked_by_foreign_lease() {
        let s = summary(0, false);
        let lease = other_lease();
        let guard = GuardContext {
            conflicting_lock: Some(&lease),
            ..ctx(&s, false)
        };
        assert!(matches!(
            apply(Status::ApprovalPending, Action::MarkSignatureReady, &guard),
            Err(WorkflowError::LockConflict { .. })
        ));
    }

    #[test]
    fn approve_branches_on_the_threshold() {
        let s = summary(0, true);
        let mut guard = ctx(&s, false);

        guard.grand_total = Decimal::from(49_999);
        assert_eq!(
            apply(Status::SignatureReady, Action::ManagerApprove, &guard).unwrap(),
            Status::PurchaseReady
        );

        guard.grand_total = Decimal::from(50_000);
        assert_eq!(
            apply(Status::SignatureReady, Action::ManagerApprove, &guard).unwrap(),
            Status::TenderReady
        );
    }

    #[test]
    fn approve_requires_manager_signature() {
        let s = summary(0, false);
        assert!(matches!(
            apply(Status::SignatureReady, Action::ManagerApprove, &ctx(&s, false)),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn rejected_is_terminal() {
        let s = summary(0, true);
        for action in [
            Action::Submit,
            Action::ManagerApprove,
            Action::ManagerReturn,
            Action::ManagerArchive,
            Action::Close,
        ] {
            assert!(
                apply(Status::RequisitionRejected, action, &ctx(&s, true)).is_err(),
                "{action:?} should be illegal from REQUISITION_REJECTED"
            );
        }
    }

    #[test]
    fn returned_loops_back_to_submit() {
        let s = summary(0, false);
        assert_eq!(
            apply(Status::RequisitionReturned, Action::Submit, &ctx(&s, true)).unwrap(),
            Status::Submitted
        );
    }

    #[test]
    fn change_control_round_trip() {
        let s = summary(0, true);
        let guard = ctx(&s, false);
        let submitted = apply(Status::TenderReady, Action::SubmitChanges, &guard).unwrap();
        assert_eq!(submitted, Status::ChangesSubmitted);
        assert_eq!(
            apply(submitted, Action::ApproveChanges, &guard).unwrap(),
            Status::ChangesApproved
        );
        assert_eq!(
            apply(Status::ChangesSubmitted, Action::RejectChanges, &guard).unwrap(),
            Status::ChangesRejected
        );
        // Distinct from REQUISITION_RETURNED: a rejected change set can still
        // be closed out.
        assert_eq!(
            apply(Status::ChangesRejected, Action::Close, &guard).unwrap(),
            Status::Closed
        );
    }

    #[test]
    fn grand_total_skips_incomplete_lines() {
        use crate::common::{ItemId, RequisitionId};

        let resource_id = RequisitionId::new();
        let line = |qty: Option<i64>, price: Option<i64>| ApprovalLine {
            id: Uuid::new_v4(),
            resource_id,
            item_id: ItemId::new(),
            description: String::new(),
            uom: None,
            quantity: qty.map(Decimal::from),
            currency: Some("USD".to_string()),
            final_unit_price: price.map(Decimal::from),
            min_price: None,
            max_price: None,
            avg_price: None,
            updated_at: Utc::now(),
        };

        let lines = vec![
            line(Some(3), Some(10)),
            line(Some(2), None),
            line(None, Some(7)),
            line(Some(4), Some(5)),
        ];
        assert_eq!(grand_total(&lines), Decimal::from(50));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            Status::Draft,
            Status::ApprovalPending,
            Status::ChangesRejected,
            Status::RequisitionReturned,
        ] {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("APROVAL_PENDING"), None);
    }
}
