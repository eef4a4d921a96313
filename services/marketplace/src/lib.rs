//! Marketplace Order Book Service
//!
//! Fixed-price marketplace for non-fungible assets, settling against
//! external registry and ledger contracts:
//! - admin-maintained whitelist of settlement currencies
//! - one active order per asset, with explicit expiry
//! - atomic settlement: payment by allowance, then asset transfer
//! - append-only operation journal with snapshot recovery
//!
//! **Key Invariants:**
//! - Operations are serialized; no caller observes a half-applied one
//! - Store indexes (all orders, per-seller) always mirror the order map
//! - Expired orders reject purchase but stay visible until purged
//! - Rejected operations journal nothing; committed ones journal every
//!   event before the caller sees success

pub mod engine;
pub mod errors;
pub mod events;
pub mod security;
pub mod storage;
pub mod store;
pub mod whitelist;

pub use engine::Marketplace;
pub use storage::{DurableMarketplace, StorageConfig};
