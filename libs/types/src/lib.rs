//! Types library for the NFT marketplace
//!
//! This library provides the core type definitions shared across the
//! marketplace system: identifier newtypes, the composite asset key,
//! validated monetary amounts, and the order record itself.
//!
//! # Modules
//! - `ids`: Unique identifiers (AccountId, CollectionId, TokenId, CurrencyId)
//! - `asset`: Composite asset key (collection + token)
//! - `numeric`: Validated monetary amounts (Price)
//! - `order`: The marketplace order record

// Public modules
pub mod asset;
pub mod ids;
pub mod numeric;
pub mod order;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::asset::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}
