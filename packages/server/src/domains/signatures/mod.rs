//! Append-only signature ledger: who signed which role and when, with
//! revocation flags instead of destructive updates.

pub mod ledger;
pub mod models;

pub use models::{RequiredOfficer, Signature, SignatureSummary, SignerRole};
