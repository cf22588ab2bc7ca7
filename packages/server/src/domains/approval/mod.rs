//! Approval state machine: per-requisition status, the append-only ledger's
//! gating rules, and the editable approval package (lines + comment).

pub mod activities;
pub mod machines;
pub mod models;
pub mod policy;

pub use machines::{Action, Status};
pub use models::{ApprovalLine, ApprovalSubject};
