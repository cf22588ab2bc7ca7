// Common types and utilities shared across the application

pub mod caller;
pub mod entity_ids;
pub mod errors;
pub mod id;

pub use caller::{Caller, UserRole};
pub use entity_ids::*;
pub use errors::WorkflowError;
pub use id::Id;
