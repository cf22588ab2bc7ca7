//! Typed ID definitions for all domain entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for requisitions (the resource an approval package belongs to).
pub struct Requisition;

/// Marker type for external user identities (weak reference, no local table).
pub struct User;

/// Marker type for suppliers submitting price quotes.
pub struct Supplier;

/// Marker type for requisition line items.
pub struct Item;

/// Marker type for edit leases.
pub struct Lease;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type RequisitionId = Id<Requisition>;
pub type UserId = Id<User>;
pub type SupplierId = Id<Supplier>;
pub type ItemId = Id<Item>;
pub type LeaseId = Id<Lease>;
