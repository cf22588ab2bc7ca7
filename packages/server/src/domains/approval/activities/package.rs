//! Bootstrap and read side of the approval package.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{Caller, RequisitionId, UserId, WorkflowError};
use crate::config::LeaseConfig;
use crate::domains::locking::coordinator::{self, PACKAGE_SCOPE, REQUISITION_TYPE};
use crate::domains::locking::{LockLease, LockStatus};
use crate::domains::pricing::models::PriceQuote;
use crate::domains::pricing::{aggregate, ReferencePriceLine};
use crate::domains::signatures::models::RequiredOfficer;
use crate::domains::signatures::{ledger, Signature, SignatureSummary};

use super::super::models::{ApprovalLine, ApprovalSubject, LineDraft};

#[derive(Debug, Deserialize)]
pub struct CreateRequisition {
    /// Client-supplied id, or a fresh one when omitted.
    pub resource_id: Option<RequisitionId>,
    /// Officers whose signatures the manager's will wait on.
    #[serde(default)]
    pub officers: Vec<UserId>,
    #[serde(default)]
    pub lines: Vec<LineDraft>,
}

pub async fn create_requisition(
    pool: &PgPool,
    request: &CreateRequisition,
) -> Result<ApprovalSubject, WorkflowError> {
    let resource_id = request.resource_id.unwrap_or_default();

    let mut tx = pool.begin().await?;
    let subject = ApprovalSubject::create(resource_id, &mut *tx).await?;
    for officer in &request.officers {
        RequiredOfficer::add(resource_id, *officer, &mut *tx).await?;
    }
    for draft in &request.lines {
        ApprovalLine::upsert_draft(resource_id, draft, &mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(resource_id = %resource_id, "requisition created");
    Ok(subject)
}

/// Lease fields plus the client-policy knobs, so owner and watchers run the
/// same heartbeat/poll/idle timings.
#[derive(Debug, Serialize)]
pub struct LockInfo {
    pub owner_id: UserId,
    pub owner_name: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub heartbeat_interval_secs: i64,
    pub idle_timeout_secs: i64,
    pub poll_interval_secs: i64,
}

impl LockInfo {
    pub fn from_lease(lease: &LockLease, config: &LeaseConfig) -> Self {
        Self {
            owner_id: lease.owner_id,
            owner_name: lease.owner_name.clone(),
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
            heartbeat_interval_secs: config.heartbeat_interval_secs,
            idle_timeout_secs: config.idle_timeout_secs,
            poll_interval_secs: config.poll_interval_secs,
        }
    }
}

/// Snapshot returned from the edit endpoint.
#[derive(Debug, Serialize)]
pub struct PackageView {
    pub subject: ApprovalSubject,
    pub lines: Vec<ApprovalLine>,
    pub signatures: Vec<Signature>,
    pub signature_summary: SignatureSummary,
    pub reference_prices: Vec<ReferencePriceLine>,
    pub lock_status: LockStatus,
    pub lock_info: Option<LockInfo>,
}

/// Load the package for editing, acquiring or renewing the caller's lease as
/// a side effect. A denied lease still returns the snapshot read-only, with
/// the holder's identity in `lock_info`.
pub async fn load_package_for_edit(
    pool: &PgPool,
    lease_config: &LeaseConfig,
    caller: &Caller,
    resource_id: RequisitionId,
) -> Result<PackageView, WorkflowError> {
    // Existence first: never leave leases behind for unknown resources.
    let subject = ApprovalSubject::find(resource_id, pool)
        .await?
        .ok_or(WorkflowError::NotFound)?;

    let acquisition = coordinator::acquire(
        pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        caller,
        lease_config.ttl(),
    )
    .await?;

    let lines = ApprovalLine::find_for_resource(resource_id, pool).await?;
    let signatures = Signature::find_for_resource(resource_id, pool).await?;
    let signature_summary = ledger::summary(pool, resource_id).await?;
    let quotes = PriceQuote::find_for_resource(resource_id, pool).await?;
    let reference_prices = aggregate::aggregate(&quotes);

    Ok(PackageView {
        subject,
        lines,
        signatures,
        signature_summary,
        reference_prices,
        lock_status: acquisition.status(),
        lock_info: Some(LockInfo::from_lease(acquisition.lease(), lease_config)),
    })
}
