//! Collaborator Contract Models for the Marketplace
//!
//! This crate models the two external contracts the marketplace order
//! book settles against: the non-fungible asset registry (ownership,
//! approvals, minting) and the fungible currency ledger (balances,
//! allowances, transfer-from). Each is a trait the engine is generic
//! over, plus a reference in-memory implementation used by tests and
//! in-process deployments.
//!
//! # Modules
//! - `errors`: Contract-specific error types
//! - `registry`: Asset registry trait and `TokenRegistry` reference model
//! - `ledger`: Currency ledger trait and `TokenLedger` reference model

pub mod errors;
pub mod ledger;
pub mod registry;

/// Contract ABI version — frozen after release
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";
