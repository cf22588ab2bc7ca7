//! Ledger operations. Every write runs in a transaction that first row-locks
//! the approval subject, so signature writes and comment edits on one
//! resource are serialized against each other; that lock is also what closes
//! the "comment edit races a signature" window.

use sqlx::{PgConnection, PgPool};

use crate::common::{RequisitionId, UserId, WorkflowError};
use crate::domains::approval::models::ApprovalSubject;

use super::models::{RequiredOfficer, Signature, SignatureSummary, SignerRole};

/// Record a signature.
///
/// Fails with `AlreadySigned` when an unrevoked signature for the same
/// (resource, role, user) exists, and with `OrderingViolation` when a manager
/// signs before every required officer has. The first signature on a resource
/// locks the free-text comment.
pub async fn sign(
    pool: &PgPool,
    resource_id: RequisitionId,
    role: SignerRole,
    user_id: UserId,
    signature_image: &str,
) -> Result<Signature, WorkflowError> {
    let mut tx = pool.begin().await?;

    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    if subject.status.is_archived() {
        return Err(WorkflowError::InvalidTransition {
            status: subject.status.to_string(),
            action: "sign",
        });
    }

    if Signature::exists_active(resource_id, role, user_id, &mut *tx).await? {
        return Err(WorkflowError::AlreadySigned {
            role: role.to_string(),
        });
    }

    if role == SignerRole::Manager {
        let required = RequiredOfficer::ids_for_resource(resource_id, &mut *tx).await?;
        let signed = Signature::active_signer_ids(resource_id, SignerRole::Officer, &mut *tx).await?;
        let missing: Vec<UserId> = required
            .into_iter()
            .filter(|officer| !signed.contains(officer))
            .collect();
        if !missing.is_empty() {
            return Err(WorkflowError::OrderingViolation { missing });
        }
    }

    let signature = Signature::insert(resource_id, role, user_id, signature_image, &mut *tx).await?;

    if subject.comment_locked_at.is_none() {
        ApprovalSubject::lock_comment(resource_id, signature.signed_at, &mut *tx).await?;
    }

    tx.commit().await?;

    tracing::info!(
        resource_id = %resource_id,
        role = %role,
        user_id = %user_id,
        "signature recorded"
    );

    Ok(signature)
}

/// Revoke the caller's own signature by flipping the flag; the row stays.
///
/// Officers may not withdraw once a manager has signed (`Forbidden`). Revoking
/// a signature that does not exist is a no-op, and revoking the last active
/// signature reopens the comment (full reset).
pub async fn revoke(
    pool: &PgPool,
    resource_id: RequisitionId,
    role: SignerRole,
    user_id: UserId,
) -> Result<(), WorkflowError> {
    let mut tx = pool.begin().await?;

    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    if subject.status.is_archived() {
        return Err(WorkflowError::InvalidTransition {
            status: subject.status.to_string(),
            action: "revoke a signature",
        });
    }

    if role == SignerRole::Officer
        && Signature::role_active(resource_id, SignerRole::Manager, &mut *tx).await?
    {
        return Err(WorkflowError::Forbidden(
            "officer signatures cannot be withdrawn after manager sign-off".to_string(),
        ));
    }

    let revoked = Signature::revoke_active(resource_id, role, user_id, &mut *tx).await?;

    if revoked > 0 && !Signature::any_active(resource_id, &mut *tx).await? {
        ApprovalSubject::unlock_comment(resource_id, &mut *tx).await?;
    }

    tx.commit().await?;

    if revoked > 0 {
        tracing::info!(
            resource_id = %resource_id,
            role = %role,
            user_id = %user_id,
            "signature revoked"
        );
    }

    Ok(())
}

/// Used to gate comment mutability in read payloads.
pub async fn has_any_signature(
    pool: &PgPool,
    resource_id: RequisitionId,
) -> Result<bool, WorkflowError> {
    let mut conn = pool.acquire().await?;
    Ok(Signature::any_active(resource_id, &mut *conn).await?)
}

/// Save the free-text comment.
///
/// The ledger is re-queried inside the transaction: if any unrevoked
/// signature exists by the time we would write, the edit is rejected with
/// `StaleWrite` and the caller re-syncs. After a full revocation reset the
/// comment becomes writable again.
pub async fn save_comment(
    pool: &PgPool,
    resource_id: RequisitionId,
    comment: &str,
) -> Result<ApprovalSubject, WorkflowError> {
    let mut tx = pool.begin().await?;

    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    if subject.status.is_archived() {
        return Err(WorkflowError::InvalidTransition {
            status: subject.status.to_string(),
            action: "edit the comment",
        });
    }

    if Signature::any_active(resource_id, &mut *tx).await? {
        return Err(WorkflowError::StaleWrite);
    }

    let updated = ApprovalSubject::set_comment(resource_id, comment, &mut *tx).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Ledger snapshot for guards and read payloads.
pub async fn summary(
    pool: &PgPool,
    resource_id: RequisitionId,
) -> Result<SignatureSummary, WorkflowError> {
    let mut conn = pool.acquire().await?;
    load_summary(resource_id, &mut conn).await
}

/// Same snapshot from inside an open transaction.
pub async fn load_summary(
    resource_id: RequisitionId,
    conn: &mut PgConnection,
) -> Result<SignatureSummary, WorkflowError> {
    let required_officers = RequiredOfficer::ids_for_resource(resource_id, &mut *conn).await?;
    let signed_officers =
        Signature::active_signer_ids(resource_id, SignerRole::Officer, &mut *conn).await?;
    let manager_signed = Signature::role_active(resource_id, SignerRole::Manager, &mut *conn).await?;
    let any_active = manager_signed
        || !signed_officers.is_empty()
        || Signature::any_active(resource_id, &mut *conn).await?;

    Ok(SignatureSummary {
        required_officers,
        signed_officers,
        manager_signed,
        any_active,
    })
}
