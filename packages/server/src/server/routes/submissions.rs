//! Supplier quote intake and the derived-price read endpoints.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::common::{Caller, RequisitionId};
use crate::domains::pricing::models::PriceQuote;
use crate::domains::pricing::submissions::{self, SupplierSubmission};
use crate::domains::pricing::{aggregate, Recommendation, ReferencePriceLine};
use crate::server::app::AppState;
use crate::server::error::ApiError;

pub async fn record_submission_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
    Path(resource_id): Path<RequisitionId>,
    Json(body): Json<SupplierSubmission>,
) -> Result<(StatusCode, Json<Vec<PriceQuote>>), ApiError> {
    let recorded =
        submissions::record_submission(&state.db_pool, &caller, resource_id, &body).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

pub async fn reference_prices_handler(
    Extension(state): Extension<AppState>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<Vec<ReferencePriceLine>>, ApiError> {
    let quotes = PriceQuote::find_for_resource(resource_id, &state.db_pool).await
        .map_err(crate::common::WorkflowError::from)?;
    Ok(Json(aggregate::aggregate(&quotes)))
}

#[derive(Serialize)]
pub struct RecommendationResponse {
    pub recommendation: Option<Recommendation>,
}

pub async fn recommendation_handler(
    Extension(state): Extension<AppState>,
    Path(resource_id): Path<RequisitionId>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let quotes = PriceQuote::find_for_resource(resource_id, &state.db_pool).await
        .map_err(crate::common::WorkflowError::from)?;
    let recommendation = aggregate::recommend(&quotes)?;
    Ok(Json(RecommendationResponse { recommendation }))
}
