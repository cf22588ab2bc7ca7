//! Status transitions: policy gate, machine guard, persist, all behind the
//! per-resource row lock.

use chrono::Utc;
use sqlx::{PgConnection, PgPool};

use crate::common::{Caller, RequisitionId, UserId, WorkflowError};
use crate::config::Config;
use crate::domains::locking::coordinator::{PACKAGE_SCOPE, REQUISITION_TYPE};
use crate::domains::locking::{LockLease, LockStatus};
use crate::domains::signatures::ledger;

use super::super::machines::{self, Action, GuardContext, Status};
use super::super::models::{ApprovalLine, ApprovalSubject};
use super::super::policy::{self, PolicyAction};

fn policy_action(action: Action) -> Option<PolicyAction> {
    Some(match action {
        Action::Submit => PolicyAction::Submit,
        Action::RecordInvitations => PolicyAction::RecordInvitations,
        Action::RecordManualEntry => PolicyAction::RecordManualEntry,
        Action::RequestApproval => PolicyAction::RequestApproval,
        Action::ManagerApprove => PolicyAction::ManagerApprove,
        Action::ManagerReject => PolicyAction::ManagerReject,
        Action::ManagerReturn => PolicyAction::ManagerReturn,
        Action::ManagerArchive => PolicyAction::ManagerArchive,
        Action::SubmitChanges => PolicyAction::SubmitChanges,
        Action::ApproveChanges => PolicyAction::ApproveChanges,
        Action::RejectChanges => PolicyAction::RejectChanges,
        Action::Close => PolicyAction::Close,
        // Machine-internal; never requested directly.
        Action::MarkSignatureReady => return None,
    })
}

/// Lease state from one caller's point of view, read on the open connection
/// so transition guards see it from inside the subject's row lock.
async fn lease_state(
    resource_id: RequisitionId,
    caller: UserId,
    conn: &mut PgConnection,
) -> Result<(bool, Option<LockLease>), WorkflowError> {
    let lease = LockLease::find(
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        &mut *conn,
    )
    .await?;
    Ok(match lease {
        Some(lease) => match lease.status_for(caller, Utc::now()) {
            LockStatus::Owned => (true, None),
            LockStatus::Locked => (false, Some(lease)),
            LockStatus::None => (false, None),
        },
        None => (false, None),
    })
}

/// Perform one caller-requested transition. The optional note is persisted
/// verbatim for return/reject.
pub async fn perform(
    pool: &PgPool,
    config: &Config,
    caller: &Caller,
    resource_id: RequisitionId,
    action: Action,
    note: Option<&str>,
) -> Result<ApprovalSubject, WorkflowError> {
    let gate = policy_action(action).ok_or_else(|| {
        WorkflowError::Forbidden(format!("{} cannot be requested directly", action.verb()))
    })?;

    let mut tx = pool.begin().await?;

    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::load_summary(resource_id, &mut tx).await?;
    let (holds_lease, conflicting) = lease_state(resource_id, caller.user_id, &mut tx).await?;

    if !policy::can_perform(gate, subject.status, caller.roles(), &summary) {
        return Err(WorkflowError::Forbidden(format!(
            "not permitted to {} while status is {}",
            action.verb(),
            subject.status
        )));
    }

    let lines = ApprovalLine::find_for_resource(resource_id, &mut *tx).await?;
    let guard = GuardContext {
        signatures: &summary,
        conflicting_lock: conflicting.as_ref(),
        holds_lease,
        grand_total: machines::grand_total(&lines),
        tender_threshold: config.tender_threshold,
    };

    let next = machines::apply(subject.status, action, &guard)?;

    // Note first: the status update's RETURNING row is what the caller sees,
    // and it must already carry the note.
    if matches!(action, Action::ManagerReturn | Action::ManagerReject) {
        ApprovalSubject::set_return_note(resource_id, note, &mut *tx).await?;
    }
    let updated = ApprovalSubject::set_status(resource_id, next, &mut *tx).await?;

    tx.commit().await?;

    tracing::info!(
        resource_id = %resource_id,
        from = %subject.status,
        to = %next,
        action = action.verb(),
        by = %caller.user_id,
        "status transition"
    );

    Ok(updated)
}

/// Advance APPROVAL_PENDING to SIGNATURE_READY once the last officer signs,
/// if the guards allow it. A guard failure here is not an error: the package
/// simply stays pending.
pub async fn try_mark_signature_ready(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
) -> Result<Status, WorkflowError> {
    let mut tx = pool.begin().await?;
    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    if subject.status != Status::ApprovalPending {
        return Ok(subject.status);
    }

    let summary = ledger::load_summary(resource_id, &mut tx).await?;
    let (_, conflicting) = lease_state(resource_id, caller.user_id, &mut tx).await?;
    let guard = GuardContext {
        signatures: &summary,
        conflicting_lock: conflicting.as_ref(),
        holds_lease: false,
        grand_total: rust_decimal::Decimal::ZERO,
        tender_threshold: rust_decimal::Decimal::ZERO,
    };

    match machines::apply(Status::ApprovalPending, Action::MarkSignatureReady, &guard) {
        Ok(next) => {
            ApprovalSubject::set_status(resource_id, next, &mut *tx).await?;
            tx.commit().await?;
            tracing::info!(resource_id = %resource_id, "package signature-ready");
            Ok(next)
        }
        Err(_) => Ok(Status::ApprovalPending),
    }
}
