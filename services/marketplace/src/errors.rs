//! Marketplace error taxonomy
//!
//! Every rejected operation surfaces as exactly one of these variants,
//! and rejection happens before any state mutation. Collaborator
//! failures keep their own detail through the `Payment` and `Registry`
//! wrappers.

use contracts::errors::{LedgerError, RegistryError};
use types::asset::AssetKey;
use types::ids::{AccountId, CurrencyId};
use types::numeric::Price;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Caller {caller} is not authorized for this operation")]
    Unauthorized { caller: AccountId },

    #[error("Currency {currency} is not whitelisted")]
    UnsupportedCurrency { currency: CurrencyId },

    #[error("An active order already exists for {key}")]
    OrderAlreadyExists { key: AssetKey },

    #[error("No active order for {key}")]
    OrderNotFound { key: AssetKey },

    #[error("Order for {key} expired at {expires_at}")]
    OrderExpired { key: AssetKey, expires_at: i64 },

    #[error("Price mismatch: listed at {expected}, submitted {submitted}")]
    PriceMismatch { expected: Price, submitted: Price },

    #[error("Caller {caller} does not own {key}")]
    NotOwner { key: AssetKey, caller: AccountId },

    #[error("Operator {operator} lacks transfer approval for {key}")]
    NotApproved { key: AssetKey, operator: AccountId },

    #[error("Expiration {expires_at} is not later than current time {current_time}")]
    InvalidExpiration { expires_at: i64, current_time: i64 },

    #[error("Payment failed: {0}")]
    Payment(#[from] LedgerError),

    #[error("Asset transfer failed: {0}")]
    Registry(#[from] RegistryError),
}
