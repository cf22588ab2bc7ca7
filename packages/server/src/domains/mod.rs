// Domain modules. Leaves first: pricing has no dependencies, signatures and
// approval build on each other, locking is composed at the edge.

pub mod approval;
pub mod locking;
pub mod pricing;
pub mod signatures;
