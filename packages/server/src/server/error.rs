//! Maps the workflow error taxonomy 1:1 onto HTTP responses. Conflict-type
//! failures carry enough payload to name the blocking party or condition.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::common::WorkflowError;

pub struct ApiError(pub WorkflowError);

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            WorkflowError::LockConflict { .. } => (StatusCode::CONFLICT, "lock_conflict"),
            WorkflowError::AlreadySigned { .. } => (StatusCode::CONFLICT, "already_signed"),
            WorkflowError::StaleWrite => (StatusCode::CONFLICT, "stale_write"),
            WorkflowError::OrderingViolation { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ordering_violation")
            }
            WorkflowError::InvalidTransition { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
            }
            WorkflowError::CurrencyMismatch(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "currency_mismatch")
            }
            WorkflowError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            WorkflowError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            WorkflowError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            WorkflowError::Database(e) => {
                tracing::error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let message = match &self.0 {
            // Never leak driver internals to clients.
            WorkflowError::Database(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let mut body = json!({ "error": code, "message": message });

        match &self.0 {
            WorkflowError::LockConflict {
                owner_id,
                owner_name,
            } => {
                body["locked_by"] = json!({ "user_id": owner_id, "name": owner_name });
            }
            WorkflowError::OrderingViolation { missing } => {
                body["missing_officers"] = json!(missing);
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserId;

    fn status_of(err: WorkflowError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn taxonomy_maps_onto_http() {
        assert_eq!(
            status_of(WorkflowError::LockConflict {
                owner_id: UserId::new(),
                owner_name: "alex".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(WorkflowError::OrderingViolation { missing: vec![] }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(WorkflowError::Forbidden("nope".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(WorkflowError::StaleWrite), StatusCode::CONFLICT);
        assert_eq!(status_of(WorkflowError::NotFound), StatusCode::NOT_FOUND);
    }
}
