//! Signature ledger endpoints: sign, un-sign, and the guarded comment write.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::common::{Caller, RequisitionId};
use crate::domains::approval::activities::signing;
use crate::domains::approval::models::ApprovalSubject;
use crate::domains::signatures::{Signature, SignerRole};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Deserialize)]
pub struct SignBody {
    pub role: SignerRole,
    /// Captured signature image, opaque to the server (data URL or similar).
    pub signature_image: String,
}

pub async fn sign_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
    Json(body): Json<SignBody>,
) -> Result<(StatusCode, Json<Signature>), ApiError> {
    let signature = signing::sign_package(
        &state.db_pool,
        &caller,
        resource_id,
        body.role,
        &body.signature_image,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(signature)))
}

#[derive(Deserialize)]
pub struct UnsignBody {
    pub role: SignerRole,
}

pub async fn unsign_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
    Json(body): Json<UnsignBody>,
) -> Result<StatusCode, ApiError> {
    signing::revoke_signature(&state.db_pool, &caller, resource_id, body.role).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

pub async fn comment_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
    Json(body): Json<CommentBody>,
) -> Result<Json<ApprovalSubject>, ApiError> {
    let subject =
        signing::save_comment(&state.db_pool, &caller, resource_id, &body.comment).await?;
    Ok(Json(subject))
}
