//! Edit-session endpoints: package snapshot (with lease side effect),
//! heartbeat/release, admin force-release, lock polling, and line drafts.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Caller, RequisitionId, WorkflowError};
use crate::domains::approval::activities::package::{
    self, CreateRequisition, LockInfo, PackageView,
};
use crate::domains::approval::activities::lines;
use crate::domains::approval::models::{ApprovalLine, ApprovalSubject, LineDraft};
use crate::domains::locking::coordinator::{self, PACKAGE_SCOPE, REQUISITION_TYPE};
use crate::domains::locking::{HeartbeatOutcome, LockStatus};
use crate::server::app::AppState;
use crate::server::error::ApiError;

pub async fn create_requisition_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateRequisition>,
) -> Result<(StatusCode, Json<ApprovalSubject>), ApiError> {
    if !caller.has_role(crate::common::UserRole::Officer) && !caller.is_admin() {
        return Err(WorkflowError::Forbidden(
            "officer access required to create a requisition".to_string(),
        )
        .into());
    }
    let subject = package::create_requisition(&state.db_pool, &body).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

/// GET editUrl: returns the snapshot and acquires/renews the lease as a side
/// effect. A LOCKED answer still includes the data, read-only.
pub async fn edit_package_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<PackageView>, ApiError> {
    let view = package::load_package_for_edit(
        &state.db_pool,
        &state.config.lease,
        &caller,
        resource_id,
    )
    .await?;
    Ok(Json(view))
}

#[derive(Serialize)]
pub struct HeartbeatResponse {
    renewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// No body. A reclaimed lease answers 200 with `renewed: false`; the client
/// re-acquires through the edit endpoint.
pub async fn heartbeat_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let outcome = coordinator::heartbeat(
        &state.db_pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        caller.user_id,
        state.config.lease.ttl(),
    )
    .await?;

    Ok(Json(match outcome {
        HeartbeatOutcome::Renewed { expires_at } => HeartbeatResponse {
            renewed: true,
            expires_at: Some(expires_at),
        },
        HeartbeatOutcome::Expired => HeartbeatResponse {
            renewed: false,
            expires_at: None,
        },
    }))
}

/// No body, idempotent: releasing an already-released lease is still 200.
pub async fn release_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<StatusCode, ApiError> {
    coordinator::release(
        &state.db_pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        caller.user_id,
    )
    .await?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
pub struct ForceReleaseResponse {
    released: bool,
}

pub async fn force_release_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<ForceReleaseResponse>, ApiError> {
    caller.require_admin()?;
    let released = coordinator::force_release(
        &state.db_pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        &caller,
    )
    .await?;
    Ok(Json(ForceReleaseResponse { released }))
}

#[derive(Serialize)]
pub struct LockStatusResponse {
    lock_status: LockStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    lock_info: Option<LockInfo>,
}

/// Side-effect-free poll for non-owners waiting on a LOCKED package.
pub async fn lock_status_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<LockStatusResponse>, ApiError> {
    let (lock_status, lease) = coordinator::status(
        &state.db_pool,
        REQUISITION_TYPE,
        resource_id.into_uuid(),
        PACKAGE_SCOPE,
        caller.user_id,
    )
    .await?;
    Ok(Json(LockStatusResponse {
        lock_status,
        lock_info: lease
            .as_ref()
            .map(|l| LockInfo::from_lease(l, &state.config.lease)),
    }))
}

#[derive(Deserialize)]
pub struct LinesBody {
    lines: Vec<LineDraft>,
}

pub async fn save_lines_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
    Json(body): Json<LinesBody>,
) -> Result<Json<Vec<ApprovalLine>>, ApiError> {
    let saved = lines::save_lines(&state.db_pool, &caller, resource_id, &body.lines).await?;
    Ok(Json(saved))
}
