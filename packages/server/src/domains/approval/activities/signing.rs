//! Signature actions composed with the state machine. Signing never requires
//! the edit lease: it is an independent, per-user, idempotent write.

use sqlx::PgPool;

use crate::common::{Caller, RequisitionId, WorkflowError};
use crate::domains::signatures::{ledger, Signature, SignerRole};

use super::super::machines::Status;
use super::super::models::ApprovalSubject;
use super::super::policy::{self, PolicyAction};
use super::transitions;

pub async fn sign_package(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
    role: SignerRole,
    signature_image: &str,
) -> Result<Signature, WorkflowError> {
    let subject = ApprovalSubject::find(resource_id, pool)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::summary(pool, resource_id).await?;

    let gate = match role {
        SignerRole::Officer => PolicyAction::SignOfficer,
        SignerRole::Manager => PolicyAction::SignManager,
    };
    if !policy::can_perform(gate, subject.status, caller.roles(), &summary) {
        return Err(WorkflowError::Forbidden(format!(
            "not permitted to sign as {} while status is {}",
            role, subject.status
        )));
    }
    if role == SignerRole::Officer && !summary.required_officers.contains(&caller.user_id) {
        return Err(WorkflowError::Forbidden(
            "not a required officer for this requisition".to_string(),
        ));
    }

    let signature = ledger::sign(pool, resource_id, role, caller.user_id, signature_image).await?;

    // The last officer signature may complete the set; the guard decides.
    if role == SignerRole::Officer {
        transitions::try_mark_signature_ready(pool, caller, resource_id).await?;
    }

    Ok(signature)
}

pub async fn revoke_signature(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
    role: SignerRole,
) -> Result<(), WorkflowError> {
    let subject = ApprovalSubject::find(resource_id, pool)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::summary(pool, resource_id).await?;

    let gate = match role {
        SignerRole::Officer => PolicyAction::RevokeOfficer,
        SignerRole::Manager => PolicyAction::RevokeManager,
    };
    if !policy::can_perform(gate, subject.status, caller.roles(), &summary) {
        return Err(WorkflowError::Forbidden(format!(
            "not permitted to revoke a {} signature while status is {}",
            role, subject.status
        )));
    }

    ledger::revoke(pool, resource_id, role, caller.user_id).await?;

    // SIGNATURE_READY's entry condition may no longer hold; regress so the
    // invariant stays true, not merely displayed.
    if role == SignerRole::Officer {
        regress_if_incomplete(pool, resource_id).await?;
    }

    Ok(())
}

/// Save the free-text comment, policy-gated like every other package edit.
/// The ledger re-checks inside its transaction; this gate is the single
/// policy consultation for the route.
pub async fn save_comment(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
    comment: &str,
) -> Result<ApprovalSubject, WorkflowError> {
    let subject = ApprovalSubject::find(resource_id, pool)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::summary(pool, resource_id).await?;

    if !policy::can_perform(
        PolicyAction::EditComment,
        subject.status,
        caller.roles(),
        &summary,
    ) {
        return Err(if subject.status.is_archived() {
            WorkflowError::InvalidTransition {
                status: subject.status.to_string(),
                action: "edit the comment",
            }
        } else {
            WorkflowError::StaleWrite
        });
    }

    ledger::save_comment(pool, resource_id, comment).await
}

async fn regress_if_incomplete(
    pool: &PgPool,
    resource_id: RequisitionId,
) -> Result<(), WorkflowError> {
    let mut tx = pool.begin().await?;
    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    if subject.status != Status::SignatureReady {
        return Ok(());
    }

    let summary = ledger::load_summary(resource_id, &mut tx).await?;
    if !summary.officers_complete() {
        ApprovalSubject::set_status(resource_id, Status::ApprovalPending, &mut *tx).await?;
        tx.commit().await?;
        tracing::info!(resource_id = %resource_id, "package back to approval-pending after revoke");
    }

    Ok(())
}
