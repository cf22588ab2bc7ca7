//! Draft line editing. The lease is the single arbiter of who may mutate
//! editable fields; signature presence further narrows what officers may do.

use sqlx::PgPool;

use crate::common::{Caller, RequisitionId, WorkflowError};
use crate::domains::locking::coordinator::{self, PACKAGE_SCOPE, REQUISITION_TYPE};
use crate::domains::locking::LockStatus;
use crate::domains::signatures::ledger;

use super::super::models::{ApprovalLine, ApprovalSubject, LineDraft};
use super::super::policy::{self, PolicyAction};

pub async fn save_lines(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
    drafts: &[LineDraft],
) -> Result<Vec<ApprovalLine>, WorkflowError> {
    let (lock_status, lease) = coordinator::status(
        pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        caller.user_id,
    )
    .await?;
    match lock_status {
        LockStatus::Owned => {}
        LockStatus::Locked => {
            let lease = lease.ok_or(WorkflowError::NotFound)?;
            return Err(WorkflowError::LockConflict {
                owner_id: lease.owner_id,
                owner_name: lease.owner_name,
            });
        }
        LockStatus::None => {
            return Err(WorkflowError::Forbidden(
                "acquire the edit lease before editing lines".to_string(),
            ))
        }
    }

    let mut tx = pool.begin().await?;
    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::load_summary(resource_id, &mut tx).await?;

    if !policy::can_perform(PolicyAction::EditLines, subject.status, caller.roles(), &summary) {
        return Err(WorkflowError::Forbidden(format!(
            "line edits are not permitted while status is {} with signatures present",
            subject.status
        )));
    }

    let mut saved = Vec::with_capacity(drafts.len());
    for draft in drafts {
        saved.push(ApprovalLine::upsert_draft(resource_id, draft, &mut *tx).await?);
    }
    tx.commit().await?;

    tracing::debug!(
        resource_id = %resource_id,
        lines = saved.len(),
        by = %caller.user_id,
        "draft lines saved"
    );

    Ok(saved)
}
