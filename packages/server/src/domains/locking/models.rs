use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::common::{LeaseId, UserId};

/// One row in the server-owned lease table. At most one row exists per
/// (resource_type, resource_id, scope); an expired row may still be present
/// until the next acquire reclaims it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LockLease {
    pub id: LeaseId,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub scope: String,
    pub owner_id: UserId,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Lock state relative to one caller, as surfaced in edit payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    None,
    Owned,
    Locked,
}

impl LockLease {
    /// Stale once `now` has passed `expires_at`. Staleness is checked lazily;
    /// nothing sweeps the table.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Classify this lease from one caller's point of view. An expired lease
    /// counts as no lease at all.
    pub fn status_for(&self, caller: UserId, now: DateTime<Utc>) -> LockStatus {
        if self.is_expired_at(now) {
            LockStatus::None
        } else if self.owner_id == caller {
            LockStatus::Owned
        } else {
            LockStatus::Locked
        }
    }

    pub async fn find(
        resource_type: &str,
        resource_id: Uuid,
        scope: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM edit_leases WHERE resource_type = $1 AND resource_id = $2 AND scope = $3",
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(scope)
        .fetch_optional(executor)
        .await
    }

    /// Delete the caller's own lease. Idempotent: deleting a lease that is
    /// already gone is fine.
    pub async fn delete_owned(
        resource_type: &str,
        resource_id: Uuid,
        scope: &str,
        owner_id: UserId,
        executor: impl PgExecutor<'_>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM edit_leases
             WHERE resource_type = $1 AND resource_id = $2 AND scope = $3 AND owner_id = $4",
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(scope)
        .bind(owner_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete whatever lease exists on the tuple, regardless of owner.
    pub async fn delete_any(
        resource_type: &str,
        resource_id: Uuid,
        scope: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM edit_leases
             WHERE resource_type = $1 AND resource_id = $2 AND scope = $3",
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(scope)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
