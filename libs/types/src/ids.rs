//! Unique identifier types for marketplace entities
//!
//! Account and collection identities use UUID v7 for time-sortable
//! ordering; asset identifiers are plain numeric ids scoped to their
//! collection, and currencies are referenced by symbol.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a participant account
///
/// Covers every identity the marketplace deals with: sellers, buyers,
/// the administrator, and the marketplace itself when it acts as the
/// approved transfer operator or allowance spender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Create a new AccountId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for an asset collection
///
/// A collection is one external asset-registry contract instance; every
/// non-fungible asset is addressed by its collection plus a [`TokenId`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CollectionId(Uuid);

impl CollectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric asset identifier, unique within its collection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenId(u64);

impl TokenId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw numeric id
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fungible currency identifier (symbol)
///
/// Identifies one currency-ledger contract, e.g. "USDC" or "WETH".
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CurrencyId(String);

impl CurrencyId {
    /// Create a new CurrencyId from a symbol string
    ///
    /// # Panics
    /// Panics if the symbol is empty
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(!s.is_empty(), "CurrencyId must not be empty");
        Self(s)
    }

    /// Try to create a CurrencyId, returning None if invalid
    pub fn try_new(symbol: impl Into<String>) -> Option<Self> {
        let s = symbol.into();
        if s.is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the symbol string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_creation() {
        let id1 = AccountId::new();
        let id2 = AccountId::new();
        assert_ne!(id1, id2, "AccountIds should be unique");
    }

    #[test]
    fn test_account_id_serialization() {
        let id = AccountId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_collection_id_creation() {
        let id1 = CollectionId::new();
        let id2 = CollectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_token_id_value() {
        let token = TokenId::new(42);
        assert_eq!(token.value(), 42);
        assert_eq!(token.to_string(), "42");
    }

    #[test]
    fn test_token_id_ordering() {
        assert!(TokenId::new(1) < TokenId::new(2));
    }

    #[test]
    fn test_currency_id_creation() {
        let currency = CurrencyId::new("USDC");
        assert_eq!(currency.as_str(), "USDC");
        assert_eq!(CurrencyId::from("USDC"), currency);
    }

    #[test]
    fn test_currency_id_try_new_rejects_empty() {
        assert_eq!(CurrencyId::try_new(""), None);
        assert_eq!(CurrencyId::try_new("DAI"), Some(CurrencyId::new("DAI")));
    }

    #[test]
    #[should_panic(expected = "must not be empty")]
    fn test_currency_id_new_panics_on_empty() {
        CurrencyId::new("");
    }

    #[test]
    fn test_currency_id_serialization() {
        let currency = CurrencyId::new("WETH");
        let json = serde_json::to_string(&currency).unwrap();
        assert_eq!(json, "\"WETH\"");

        let deserialized: CurrencyId = serde_json::from_str(&json).unwrap();
        assert_eq!(currency, deserialized);
    }
}
