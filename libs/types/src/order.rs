//! Marketplace order record
//!
//! A fixed-price, expiring offer to sell one specific non-fungible asset,
//! denominated in one fungible currency. Orders are immutable once
//! stored: settlement, cancellation, and expiry cleanup remove the whole
//! record, never patch it.

use crate::asset::AssetKey;
use crate::ids::{AccountId, CurrencyId};
use crate::numeric::Price;
use serde::{Deserialize, Serialize};

/// Complete order record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Asset being sold (collection + token id)
    pub key: AssetKey,
    /// Account that listed the asset; only this account may cancel
    pub seller: AccountId,
    /// Exact amount a buyer must pay, in smallest units of `currency`
    pub price: Price,
    /// Payment currency, whitelisted at the moment of creation
    pub currency: CurrencyId,
    /// Unix seconds after which the order is no longer purchasable
    pub expires_at: i64,
    /// Unix seconds at creation, for listing consumers
    pub created_at: i64,
}

impl Order {
    pub fn new(
        key: AssetKey,
        seller: AccountId,
        price: Price,
        currency: CurrencyId,
        expires_at: i64,
        created_at: i64,
    ) -> Self {
        Self {
            key,
            seller,
            price,
            currency,
            expires_at,
            created_at,
        }
    }

    /// An order is purchasable up to and including its expiry instant
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    pub fn is_active(&self, now: i64) -> bool {
        !self.is_expired(now)
    }
}
