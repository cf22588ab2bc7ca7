use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::postgres::PgExecutor;
use uuid::Uuid;

use crate::common::{ItemId, RequisitionId};

use super::machines::Status;

/// The approval package for one requisition. Status transitions are the only
/// legal mutator of `status`; the comment is writable only while
/// `comment_locked_at` is unset.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprovalSubject {
    pub resource_id: RequisitionId,
    #[sqlx(try_from = "String")]
    pub status: Status,
    pub comment: String,
    pub comment_locked_at: Option<DateTime<Utc>>,
    pub return_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalSubject {
    pub async fn create(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO approval_subjects (resource_id)
            VALUES ($1)
            ON CONFLICT (resource_id) DO UPDATE SET resource_id = EXCLUDED.resource_id
            RETURNING *
            "#,
        )
        .bind(resource_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM approval_subjects WHERE resource_id = $1")
            .bind(resource_id)
            .fetch_optional(executor)
            .await
    }

    /// Row-lock the subject for the duration of the surrounding transaction.
    /// Every mutating workflow takes this lock first, which serializes writes
    /// per resource while leaving other resources untouched.
    pub async fn lock(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM approval_subjects WHERE resource_id = $1 FOR UPDATE",
        )
        .bind(resource_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_status(
        resource_id: RequisitionId,
        status: Status,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE approval_subjects SET status = $2, updated_at = now()
             WHERE resource_id = $1 RETURNING *",
        )
        .bind(resource_id)
        .bind(status.as_str())
        .fetch_one(executor)
        .await
    }

    /// Persist a manager's return note verbatim alongside the status change.
    pub async fn set_return_note(
        resource_id: RequisitionId,
        note: Option<&str>,
        executor: impl PgExecutor<'_>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE approval_subjects SET return_note = $2, updated_at = now()
             WHERE resource_id = $1",
        )
        .bind(resource_id)
        .bind(note)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_comment(
        resource_id: RequisitionId,
        comment: &str,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "UPDATE approval_subjects SET comment = $2, updated_at = now()
             WHERE resource_id = $1 RETURNING *",
        )
        .bind(resource_id)
        .bind(comment)
        .fetch_one(executor)
        .await
    }

    pub async fn lock_comment(
        resource_id: RequisitionId,
        at: DateTime<Utc>,
        executor: impl PgExecutor<'_>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE approval_subjects SET comment_locked_at = $2, updated_at = now()
             WHERE resource_id = $1 AND comment_locked_at IS NULL",
        )
        .bind(resource_id)
        .bind(at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Reopen the comment after a full signature reset.
    pub async fn unlock_comment(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE approval_subjects SET comment_locked_at = NULL, updated_at = now()
             WHERE resource_id = $1",
        )
        .bind(resource_id)
        .execute(executor)
        .await?;
        Ok(())
    }
}

/// One item on the approval package. min/max/avg are derived from quotes and
/// refreshed whenever aggregation runs; `final_unit_price` is what officers
/// and the manager actually sign off on.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ApprovalLine {
    pub id: Uuid,
    pub resource_id: RequisitionId,
    pub item_id: ItemId,
    pub description: String,
    pub uom: Option<String>,
    pub quantity: Option<Decimal>,
    pub currency: Option<String>,
    pub final_unit_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub avg_price: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

/// Editable fields of one line, as accepted from the client.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LineDraft {
    pub item_id: ItemId,
    #[serde(default)]
    pub description: String,
    pub uom: Option<String>,
    pub quantity: Option<Decimal>,
    pub currency: Option<String>,
    pub final_unit_price: Option<Decimal>,
}

impl ApprovalLine {
    pub async fn upsert_draft(
        resource_id: RequisitionId,
        draft: &LineDraft,
        executor: impl PgExecutor<'_>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO approval_lines
                (resource_id, item_id, description, uom, quantity, currency, final_unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (resource_id, item_id) DO UPDATE SET
                description = EXCLUDED.description,
                uom = EXCLUDED.uom,
                quantity = EXCLUDED.quantity,
                currency = EXCLUDED.currency,
                final_unit_price = EXCLUDED.final_unit_price,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(resource_id)
        .bind(draft.item_id)
        .bind(&draft.description)
        .bind(&draft.uom)
        .bind(draft.quantity)
        .bind(&draft.currency)
        .bind(draft.final_unit_price)
        .fetch_one(executor)
        .await
    }

    pub async fn find_for_resource(
        resource_id: RequisitionId,
        executor: impl PgExecutor<'_>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM approval_lines WHERE resource_id = $1 ORDER BY item_id",
        )
        .bind(resource_id)
        .fetch_all(executor)
        .await
    }

    /// Refresh the derived statistics on one line. Missing stats (no valid
    /// quotes for the item) clear the columns rather than leaving stale data.
    pub async fn update_stats(
        resource_id: RequisitionId,
        item_id: ItemId,
        min: Option<Decimal>,
        max: Option<Decimal>,
        avg: Option<Decimal>,
        executor: impl PgExecutor<'_>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE approval_lines
             SET min_price = $3, max_price = $4, avg_price = $5, updated_at = now()
             WHERE resource_id = $1 AND item_id = $2",
        )
        .bind(resource_id)
        .bind(item_id)
        .bind(min)
        .bind(max)
        .bind(avg)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
