//! Price aggregation: per-item min/max/avg reference lines and the
//! lowest-total supplier recommendation, derived from partial supplier quotes.

pub mod aggregate;
pub mod models;
pub mod submissions;

pub use aggregate::{aggregate, recommend, Recommendation, ReferencePriceLine};
pub use models::{PriceQuote, Supplier};
