//! Editing lock coordination: exclusive, time-bounded leases over a
//! (resource_type, resource_id, scope) tuple, renewed by heartbeat and
//! reclaimed lazily once expired.

pub mod coordinator;
pub mod models;

pub use coordinator::{HeartbeatOutcome, LockAcquisition};
pub use models::{LockLease, LockStatus};
