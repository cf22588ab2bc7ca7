use thiserror::Error;

use super::entity_ids::UserId;

/// Typed failure taxonomy for the approval workflow.
///
/// Every variant is surfaced to the caller; nothing here is swallowed. The
/// one benign case (heartbeat or release against a reclaimed lease) is not an
/// error at all and never reaches this enum.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Another owner holds the edit lease. Carries the holder's identity so
    /// the caller can say who is blocking.
    #[error("resource is being edited by {owner_name}")]
    LockConflict { owner_id: UserId, owner_name: String },

    #[error("an active {role} signature by this user already exists")]
    AlreadySigned { role: String },

    /// Manager attempted to sign before every required officer did.
    #[error(
        "manager sign-off requires every required officer signature ({} still missing)",
        missing.len()
    )]
    OrderingViolation { missing: Vec<UserId> },

    #[error("{0}")]
    Forbidden(String),

    /// A signature appeared while a comment edit was in flight.
    #[error("signatures changed while this edit was in flight; reload and retry")]
    StaleWrite,

    #[error("cannot {action} while status is {status}")]
    InvalidTransition { status: String, action: &'static str },

    #[error("quotes span incompatible currencies: {0}")]
    CurrencyMismatch(String),

    #[error("{0}")]
    Validation(String),

    #[error("requisition not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
