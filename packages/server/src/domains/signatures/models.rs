use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgExecutor;
use std::fmt;
use uuid::Uuid;

use crate::common::{RequisitionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    Officer,
    Manager,
}

impl SignerRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Officer => "officer",
            Self::Manager => "manager",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "officer" => Some(Self::Officer),
            "manager" => Some(Self::Manager),
            _ => None,
        }
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SignerRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown signer role: {value}"))
    }
}

/// One ledger row. Rows are never deleted; revocation flips the flag so the
/// full signing history stays auditable.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Signature {
    pub id: Uuid,
    pub resource_id: RequisitionId,
    #[sqlx(try_from = "String")]
    pub role: SignerRole,
    pub user_id: UserId,
    pub signed_at: DateTime<Utc>,
    pub signature_image: String,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Signature {
    pub async fn insert(
        resource_id: RequisitionId,
        role: SignerRole,
        user_id: UserId,
        signature_image: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO signatures (resource_id, role, user_id, signature_image)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(resource_id)
        .bind(role.as_str())
        .bind(user_id)
        .bind(signature_image)
        .fetch_one(executor)
        .await
    }

    /// Full history for a resource, revoked rows included, ordered by signing
    /// time.
    pub async fn find_for_resource(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM signatures WHERE resource_id = $1 ORDER BY signed_at, id",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }

    pub async fn exists_active(
        resource_id: RequisitionId,
        role: SignerRole,
        user_id: UserId,
        executor: impl PgExecutor<'_>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (
                 SELECT 1 FROM signatures
                 WHERE resource_id = $1 AND role = $2 AND user_id = $3 AND NOT revoked
             )",
        )
        .bind(resource_id)
        .bind(role.as_str())
        .bind(user_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    pub async fn any_active(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM signatures WHERE resource_id = $1 AND NOT revoked)",
        )
        .bind(resource_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    pub async fn role_active(
        resource_id: RequisitionId,
        role: SignerRole,
        executor: impl PgExecutor<'_>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (
                 SELECT 1 FROM signatures WHERE resource_id = $1 AND role = $2 AND NOT revoked
             )",
        )
        .bind(resource_id)
        .bind(role.as_str())
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Users with an unrevoked signature for the given role.
    pub async fn active_signer_ids(
        resource_id: RequisitionId,
        role: SignerRole,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (UserId,)>(
            "SELECT user_id FROM signatures
             WHERE resource_id = $1 AND role = $2 AND NOT revoked
             ORDER BY signed_at",
        )
        .bind(resource_id)
        .bind(role.as_str())
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Flip the revoked flag on the caller's active signature. Returns the
    /// number of rows touched (0 when there was nothing to revoke).
    pub async fn revoke_active(
        resource_id: RequisitionId,
        role: SignerRole,
        user_id: UserId,
        executor: impl PgExecutor<'_>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE signatures SET revoked = true, revoked_at = now()
             WHERE resource_id = $1 AND role = $2 AND user_id = $3 AND NOT revoked",
        )
        .bind(resource_id)
        .bind(role.as_str())
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Officers whose signatures gate the manager's.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RequiredOfficer {
    pub resource_id: RequisitionId,
    pub user_id: UserId,
}

impl RequiredOfficer {
    pub async fn add(
        resource_id: RequisitionId,
        user_id: UserId,
        executor: impl PgExecutor<'_>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO approval_officers (resource_id, user_id)
             VALUES ($1, $2)
             ON CONFLICT (resource_id, user_id) DO NOTHING",
        )
        .bind(resource_id)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn ids_for_resource(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<UserId>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (UserId,)>(
            "SELECT user_id FROM approval_officers WHERE resource_id = $1 ORDER BY user_id",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Snapshot of the ledger used by transition guards and read payloads.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureSummary {
    pub required_officers: Vec<UserId>,
    pub signed_officers: Vec<UserId>,
    pub manager_signed: bool,
    pub any_active: bool,
}

impl SignatureSummary {
    /// Required officers who have not (or no longer) signed.
    pub fn missing_officers(&self) -> Vec<UserId> {
        self.required_officers
            .iter()
            .filter(|officer| !self.signed_officers.contains(officer))
            .copied()
            .collect()
    }

    /// True once every required officer has an unrevoked signature.
    pub fn officers_complete(&self) -> bool {
        self.missing_officers().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(required: Vec<UserId>, signed: Vec<UserId>) -> SignatureSummary {
        let any_active = !signed.is_empty();
        SignatureSummary {
            required_officers: required,
            signed_officers: signed,
            manager_signed: false,
            any_active,
        }
    }

    #[test]
    fn missing_officers_excludes_signers() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        let s = summary(vec![a, b, c], vec![a, c]);
        assert_eq!(s.missing_officers(), vec![b]);
        assert!(!s.officers_complete());
    }

    #[test]
    fn complete_once_all_required_signed() {
        let (a, b) = (UserId::new(), UserId::new());
        let s = summary(vec![a, b], vec![b, a]);
        assert!(s.officers_complete());
    }

    #[test]
    fn no_required_officers_means_complete() {
        let s = summary(vec![], vec![]);
        assert!(s.officers_complete());
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(SignerRole::parse("manager"), Some(SignerRole::Manager));
        assert_eq!(SignerRole::Officer.as_str(), "officer");
        assert!(SignerRole::try_from("auditor".to_string()).is_err());
    }
}
