//! Lease coordinator: first writer wins, lazy staleness, idempotent release.
//!
//! The unique index on (resource_type, resource_id, scope) plus a conditional
//! `ON CONFLICT ... DO UPDATE` is the whole serialization story for acquire:
//! concurrent requests for the same tuple settle on one winner inside
//! Postgres, requests for different tuples never contend.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{Caller, LeaseId, UserId, WorkflowError};

use super::models::{LockLease, LockStatus};

/// Resource type for requisition approval packages.
pub const REQUISITION_TYPE: &str = "requisition";

/// Scope covering the editable approval package (comment + final prices).
pub const PACKAGE_SCOPE: &str = "approval-package";

/// Outcome of an acquire attempt.
#[derive(Debug)]
pub enum LockAcquisition {
    /// Caller holds the lease (fresh grant or idempotent renewal).
    Owned(LockLease),
    /// Someone else holds it; their identity is surfaced for the UI.
    Locked(LockLease),
}

impl LockAcquisition {
    pub fn lease(&self) -> &LockLease {
        match self {
            Self::Owned(lease) | Self::Locked(lease) => lease,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    pub fn status(&self) -> LockStatus {
        match self {
            Self::Owned(_) => LockStatus::Owned,
            Self::Locked(_) => LockStatus::Locked,
        }
    }
}

#[derive(Debug)]
pub enum HeartbeatOutcome {
    Renewed { expires_at: DateTime<Utc> },
    /// The lease was reclaimed. Benign: the client simply re-acquires.
    Expired,
}

const ACQUIRE_SQL: &str = r#"
INSERT INTO edit_leases
    (id, resource_type, resource_id, scope, owner_id, owner_name,
     acquired_at, last_heartbeat_at, expires_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $7, $8)
ON CONFLICT (resource_type, resource_id, scope) DO UPDATE SET
    id = CASE WHEN edit_leases.owner_id = EXCLUDED.owner_id
                   AND edit_leases.expires_at > EXCLUDED.acquired_at
              THEN edit_leases.id ELSE EXCLUDED.id END,
    owner_id = EXCLUDED.owner_id,
    owner_name = EXCLUDED.owner_name,
    acquired_at = CASE WHEN edit_leases.owner_id = EXCLUDED.owner_id
                            AND edit_leases.expires_at > EXCLUDED.acquired_at
                       THEN edit_leases.acquired_at ELSE EXCLUDED.acquired_at END,
    last_heartbeat_at = EXCLUDED.last_heartbeat_at,
    expires_at = EXCLUDED.expires_at
WHERE edit_leases.expires_at <= EXCLUDED.acquired_at
   OR edit_leases.owner_id = EXCLUDED.owner_id
RETURNING *
"#;

/// Grant a lease if none is active or the stored one expired; otherwise report
/// the current holder. Re-acquire by the current owner renews in place.
pub async fn acquire(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    scope: &str,
    requester: &Caller,
    ttl: Duration,
) -> Result<LockAcquisition, WorkflowError> {
    // A blocking row can be released between our failed upsert and the
    // follow-up read; retry the upsert in that window.
    for _ in 0..3 {
        let now = Utc::now();
        let granted = sqlx::query_as::<_, LockLease>(ACQUIRE_SQL)
            .bind(LeaseId::new())
            .bind(resource_type)
            .bind(resource_id)
            .bind(scope)
            .bind(requester.user_id)
            .bind(&requester.name)
            .bind(now)
            .bind(now + ttl)
            .fetch_optional(pool)
            .await?;

        if let Some(lease) = granted {
            tracing::debug!(
                resource_id = %resource_id,
                scope = %scope,
                owner = %requester.user_id,
                expires_at = %lease.expires_at,
                "edit lease granted"
            );
            return Ok(LockAcquisition::Owned(lease));
        }

        match LockLease::find(resource_type, resource_id, scope, pool).await? {
            Some(existing) if !existing.is_expired_at(Utc::now()) => {
                tracing::debug!(
                    resource_id = %resource_id,
                    scope = %scope,
                    holder = %existing.owner_id,
                    "edit lease denied, already held"
                );
                return Ok(LockAcquisition::Locked(existing));
            }
            // Gone or expired in the meantime: try to claim it again.
            _ => continue,
        }
    }

    Err(WorkflowError::Database(sqlx::Error::Protocol(
        "lease acquisition did not settle after retries".into(),
    )))
}

/// Extend the owner's lease by the TTL. A reclaimed lease is not an error;
/// the caller learns it expired and re-acquires.
pub async fn heartbeat(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    scope: &str,
    owner_id: UserId,
    ttl: Duration,
) -> Result<HeartbeatOutcome, WorkflowError> {
    let now = Utc::now();
    let renewed = sqlx::query_as::<_, (DateTime<Utc>,)>(
        "UPDATE edit_leases
         SET last_heartbeat_at = $5, expires_at = $6
         WHERE resource_type = $1 AND resource_id = $2 AND scope = $3
           AND owner_id = $4 AND expires_at > $5
         RETURNING expires_at",
    )
    .bind(resource_type)
    .bind(resource_id)
    .bind(scope)
    .bind(owner_id)
    .bind(now)
    .bind(now + ttl)
    .fetch_optional(pool)
    .await?;

    Ok(match renewed {
        Some((expires_at,)) => HeartbeatOutcome::Renewed { expires_at },
        None => HeartbeatOutcome::Expired,
    })
}

/// Release the caller's lease. Unconditional and idempotent.
pub async fn release(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    scope: &str,
    owner_id: UserId,
) -> Result<(), WorkflowError> {
    let released =
        LockLease::delete_owned(resource_type, resource_id, scope, owner_id, pool).await?;
    if released > 0 {
        tracing::debug!(resource_id = %resource_id, scope = %scope, owner = %owner_id, "edit lease released");
    }
    Ok(())
}

/// Privileged override: drop the lease regardless of owner. The caller's
/// admin privilege is checked at the route layer.
pub async fn force_release(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    scope: &str,
    admin: &Caller,
) -> Result<bool, WorkflowError> {
    let released = LockLease::delete_any(resource_type, resource_id, scope, pool).await?;
    if released > 0 {
        tracing::warn!(
            resource_id = %resource_id,
            scope = %scope,
            admin = %admin.user_id,
            "edit lease force-released"
        );
    }
    Ok(released > 0)
}

/// Current lock state from one caller's point of view, for short-interval
/// polling while LOCKED.
pub async fn status(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    scope: &str,
    caller: UserId,
) -> Result<(LockStatus, Option<LockLease>), WorkflowError> {
    let lease = LockLease::find(resource_type, resource_id, scope, pool).await?;
    let now = Utc::now();
    Ok(match lease {
        Some(lease) => {
            let status = lease.status_for(caller, now);
            let visible = match status {
                LockStatus::None => None,
                _ => Some(lease),
            };
            (status, visible)
        }
        None => (LockStatus::None, None),
    })
}
