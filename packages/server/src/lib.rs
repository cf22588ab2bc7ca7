// Procurement Approval Core
//
// Backend for the requisition -> supplier quotes -> approval package -> tender
// workflow. The interesting parts live in domains/: the edit-lease coordinator,
// the signature ledger, the approval state machine, and price aggregation.

pub mod common;
pub mod config;
pub mod domains;
pub mod server;

pub use config::*;
