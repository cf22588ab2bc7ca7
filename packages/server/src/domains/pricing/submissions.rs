//! Supplier submission intake: records quotes and refreshes the derived
//! statistics on the approval lines in the same transaction.

use rust_decimal::Decimal;
use serde::Deserialize;

use sqlx::PgPool;

use crate::common::{Caller, ItemId, RequisitionId, SupplierId, WorkflowError};
use crate::domains::approval::machines::Status;
use crate::domains::approval::models::{ApprovalLine, ApprovalSubject};
use crate::domains::approval::policy::{self, PolicyAction};
use crate::domains::signatures::ledger;

use super::aggregate;
use super::models::{PriceQuote, Supplier};

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionLine {
    pub item_id: ItemId,
    pub unit_price: Decimal,
}

/// One supplier's (possibly partial) quote sheet. Either a known supplier id
/// or a free-text name must be given.
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierSubmission {
    pub supplier_id: Option<SupplierId>,
    pub supplier_name: Option<String>,
    pub currency: String,
    pub lines: Vec<SubmissionLine>,
}

/// Record a submission and refresh the per-item reference statistics.
/// Intake is an officer activity and only valid while quotes are being
/// collected.
pub async fn record_submission(
    pool: &PgPool,
    caller: &Caller,
    resource_id: RequisitionId,
    submission: &SupplierSubmission,
) -> Result<Vec<PriceQuote>, WorkflowError> {
    let mut tx = pool.begin().await?;

    // Serializes submissions per resource.
    let subject = ApprovalSubject::lock(resource_id, &mut *tx)
        .await?
        .ok_or(WorkflowError::NotFound)?;
    let summary = ledger::load_summary(resource_id, &mut tx).await?;
    if !policy::can_perform(
        PolicyAction::RecordSubmission,
        subject.status,
        caller.roles(),
        &summary,
    ) {
        return Err(
            if matches!(subject.status, Status::InvitationsSent | Status::ManualEntry) {
                WorkflowError::Forbidden(
                    "officer access is required to record a submission".to_string(),
                )
            } else {
                WorkflowError::InvalidTransition {
                    status: subject.status.to_string(),
                    action: "record a submission",
                }
            },
        );
    }

    let supplier = match (submission.supplier_id, submission.supplier_name.as_deref()) {
        (Some(id), _) => Supplier::find(id, &mut *tx)
            .await?
            .ok_or_else(|| WorkflowError::Validation("unknown supplier_id".to_string()))?,
        (None, Some(name)) if !name.trim().is_empty() => {
            Supplier::find_or_create_by_name(name.trim(), &mut *tx).await?
        }
        _ => {
            return Err(WorkflowError::Validation(
                "supplier_id or supplier_name is required".to_string(),
            ))
        }
    };

    let mut recorded = Vec::with_capacity(submission.lines.len());
    for line in &submission.lines {
        let quote = PriceQuote::upsert(
            resource_id,
            supplier.id,
            line.item_id,
            line.unit_price,
            &submission.currency,
            &mut *tx,
        )
        .await?;
        recorded.push(quote);
    }

    refresh_line_stats(resource_id, &mut tx).await?;

    tx.commit().await?;

    tracing::info!(
        resource_id = %resource_id,
        supplier_id = %supplier.id,
        quotes = recorded.len(),
        "supplier submission recorded"
    );

    Ok(recorded)
}

/// Recompute min/max/avg for every line on the package from the full quote
/// set. Lines whose item has no valid quotes get their stats cleared.
async fn refresh_line_stats(
    resource_id: RequisitionId,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
) -> Result<(), WorkflowError> {
    let quotes = PriceQuote::find_for_resource(resource_id, &mut **tx).await?;
    let reference = aggregate::aggregate(&quotes);
    let lines = ApprovalLine::find_for_resource(resource_id, &mut **tx).await?;

    for line in &lines {
        let stats = reference.iter().find(|r| r.item_id == line.item_id);
        ApprovalLine::update_stats(
            resource_id,
            line.item_id,
            stats.map(|s| s.min),
            stats.map(|s| s.max),
            stats.map(|s| s.avg),
            &mut **tx,
        )
        .await?;
    }

    Ok(())
}
