// Workflow activities: each composes the lease coordinator, the ledger, the
// pure state machine, and the models into one request-sized operation.

pub mod lines;
pub mod package;
pub mod signing;
pub mod transitions;
