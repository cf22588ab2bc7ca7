//! State machine endpoints. Each is a thin wrapper over the transitions
//! activity; the optional reason rides along for return/reject.

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;

use crate::common::{Caller, RequisitionId};
use crate::domains::approval::activities::transitions;
use crate::domains::approval::machines::Action;
use crate::domains::approval::models::ApprovalSubject;
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Deserialize, Default)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

async fn run(
    state: &AppState,
    caller: &Caller,
    resource_id: RequisitionId,
    action: Action,
    reason: Option<&str>,
) -> Result<Json<ApprovalSubject>, ApiError> {
    let subject = transitions::perform(
        &state.db_pool,
        &state.config,
        caller,
        resource_id,
        action,
        reason,
    )
    .await?;
    Ok(Json(subject))
}

macro_rules! transition_handler {
    ($name:ident, $action:expr) => {
        pub async fn $name(
            Extension(state): Extension<AppState>,
            Extension(caller): Extension<Caller>,
            Path(resource_id): Path<RequisitionId>,
            body: Option<Json<ReasonBody>>,
        ) -> Result<Json<ApprovalSubject>, ApiError> {
            let reason = body.as_ref().and_then(|b| b.reason.as_deref());
            run(&state, &caller, resource_id, $action, reason).await
        }
    };
}

transition_handler!(submit_handler, Action::Submit);
transition_handler!(record_invitations_handler, Action::RecordInvitations);
transition_handler!(record_manual_entry_handler, Action::RecordManualEntry);
transition_handler!(request_approval_handler, Action::RequestApproval);
transition_handler!(manager_approve_handler, Action::ManagerApprove);
transition_handler!(manager_reject_handler, Action::ManagerReject);
transition_handler!(manager_return_handler, Action::ManagerReturn);
transition_handler!(manager_archive_handler, Action::ManagerArchive);
transition_handler!(submit_changes_handler, Action::SubmitChanges);
transition_handler!(approve_changes_handler, Action::ApproveChanges);
transition_handler!(reject_changes_handler, Action::RejectChanges);
transition_handler!(close_handler, Action::Close);
