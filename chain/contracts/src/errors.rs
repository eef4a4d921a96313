//! Contract-specific error types
//!
//! Error taxonomy for the asset-registry and currency-ledger collaborator
//! models. The marketplace engine wraps both enums into its own taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;
use types::asset::AssetKey;
use types::ids::CollectionId;

/// Asset-registry errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: CollectionId },

    #[error("Unknown asset: {key}")]
    UnknownAsset { key: AssetKey },

    #[error("Not the owner of {key}")]
    NotOwner { key: AssetKey },

    #[error("Operator not approved for {key}")]
    NotApproved { key: AssetKey },
}

/// Currency-ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Amount must not be negative")]
    InvalidAmount,

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,
}
