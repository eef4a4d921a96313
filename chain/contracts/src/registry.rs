//! Asset registry — ownership, approvals, and minting
//!
//! The marketplace's view of external non-fungible asset contracts:
//! - `AssetRegistry` trait: the three queries/commands the engine needs
//!   (owner lookup, approval check, ownership transfer)
//! - `TokenRegistry`: a reference in-memory implementation with
//!   collections, sequential minting, per-token operator approval, and
//!   metadata URI storage

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use types::asset::AssetKey;
use types::ids::{AccountId, CollectionId, TokenId};

use crate::errors::RegistryError;

/// External asset-registry interface.
///
/// Contract requirement for implementations: within one serialized
/// marketplace operation, a registry that reported `owner_of(key) == from`
/// and `is_approved(key, operator)` must accept the matching
/// `transfer(key, from, to, operator)` call. The settlement engine relies
/// on this to guarantee that the asset leg cannot fail once the payment
/// leg has run.
pub trait AssetRegistry {
    /// Current owner of the asset
    fn owner_of(&self, key: &AssetKey) -> Result<AccountId, RegistryError>;

    /// The single approved transfer operator for the asset, if any
    fn approved_operator(&self, key: &AssetKey) -> Result<Option<AccountId>, RegistryError>;

    /// Whether `operator` may move the asset: owners may always move
    /// their own assets, otherwise the approved operator may.
    fn is_approved(&self, key: &AssetKey, operator: &AccountId) -> Result<bool, RegistryError> {
        let owner = self.owner_of(key)?;
        if owner == *operator {
            return Ok(true);
        }
        Ok(self.approved_operator(key)?.as_ref() == Some(operator))
    }

    /// Move ownership of the asset from `from` to `to`, acting as
    /// `operator`. Fails `NotOwner` if `from` is not the current owner,
    /// `NotApproved` if `operator` is neither `from` nor the approved
    /// operator. Any per-token approval is cleared on success.
    fn transfer(
        &mut self,
        key: &AssetKey,
        from: &AccountId,
        to: &AccountId,
        operator: &AccountId,
    ) -> Result<(), RegistryError>;
}

/// Collection metadata (name and ticker-style symbol)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub name: String,
    pub symbol: String,
}

/// Reference in-memory asset registry.
///
/// Tracks any number of collections. Token ids are assigned sequentially
/// from 0 within each collection; each token carries a metadata URI and
/// at most one approved operator.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    /// Registered collections and their metadata
    collections: HashMap<CollectionId, CollectionMeta>,
    /// Next token id per collection
    next_token: HashMap<CollectionId, u64>,
    /// Current owner per asset
    owners: BTreeMap<AssetKey, AccountId>,
    /// Approved operator per asset (cleared on transfer)
    approvals: HashMap<AssetKey, AccountId>,
    /// Metadata URI per asset
    uris: HashMap<AssetKey, String>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────── Collections ─────────────────────────

    /// Register a new collection, returning its identity.
    pub fn register_collection(
        &mut self,
        name: impl Into<String>,
        symbol: impl Into<String>,
    ) -> CollectionId {
        let collection = CollectionId::new();
        self.collections.insert(
            collection,
            CollectionMeta {
                name: name.into(),
                symbol: symbol.into(),
            },
        );
        self.next_token.insert(collection, 0);
        collection
    }

    /// Metadata for a registered collection.
    pub fn collection_meta(&self, collection: &CollectionId) -> Option<&CollectionMeta> {
        self.collections.get(collection)
    }

    // ───────────────────────── Minting ─────────────────────────

    /// Mint a new asset in `collection` to `to`, with a metadata URI.
    ///
    /// Token ids are sequential starting at 0.
    pub fn mint(
        &mut self,
        collection: CollectionId,
        to: AccountId,
        uri: impl Into<String>,
    ) -> Result<AssetKey, RegistryError> {
        let next = self
            .next_token
            .get_mut(&collection)
            .ok_or(RegistryError::UnknownCollection { collection })?;

        let key = AssetKey::new(collection, TokenId::new(*next));
        *next += 1;

        self.owners.insert(key, to);
        self.uris.insert(key, uri.into());
        Ok(key)
    }

    /// Metadata URI for an asset.
    pub fn token_uri(&self, key: &AssetKey) -> Option<&str> {
        self.uris.get(key).map(String::as_str)
    }

    /// Number of assets in `collection` owned by `account`.
    pub fn balance_of(&self, collection: &CollectionId, account: &AccountId) -> u64 {
        let low = AssetKey::new(*collection, TokenId::new(0));
        let high = AssetKey::new(*collection, TokenId::new(u64::MAX));
        self.owners
            .range(low..=high)
            .filter(|(_, owner)| *owner == account)
            .count() as u64
    }

    // ───────────────────────── Approvals ─────────────────────────

    /// Approve `operator` to transfer the asset. Caller must be the owner.
    pub fn approve(
        &mut self,
        key: &AssetKey,
        operator: AccountId,
        caller: &AccountId,
    ) -> Result<(), RegistryError> {
        self.check_owner(key, caller)?;
        self.approvals.insert(*key, operator);
        Ok(())
    }

    /// Clear the asset's approval. Caller must be the owner.
    pub fn revoke_approval(
        &mut self,
        key: &AssetKey,
        caller: &AccountId,
    ) -> Result<(), RegistryError> {
        self.check_owner(key, caller)?;
        self.approvals.remove(key);
        Ok(())
    }

    fn check_owner(&self, key: &AssetKey, caller: &AccountId) -> Result<(), RegistryError> {
        let owner = self
            .owners
            .get(key)
            .ok_or(self.missing_error(key))?;
        if owner != caller {
            return Err(RegistryError::NotOwner { key: *key });
        }
        Ok(())
    }

    fn missing_error(&self, key: &AssetKey) -> RegistryError {
        if self.collections.contains_key(&key.collection) {
            RegistryError::UnknownAsset { key: *key }
        } else {
            RegistryError::UnknownCollection {
                collection: key.collection,
            }
        }
    }
}

impl AssetRegistry for TokenRegistry {
    fn owner_of(&self, key: &AssetKey) -> Result<AccountId, RegistryError> {
        self.owners
            .get(key)
            .copied()
            .ok_or(self.missing_error(key))
    }

    fn approved_operator(&self, key: &AssetKey) -> Result<Option<AccountId>, RegistryError> {
        if !self.owners.contains_key(key) {
            return Err(self.missing_error(key));
        }
        Ok(self.approvals.get(key).copied())
    }

    fn transfer(
        &mut self,
        key: &AssetKey,
        from: &AccountId,
        to: &AccountId,
        operator: &AccountId,
    ) -> Result<(), RegistryError> {
        let owner = self.owner_of(key)?;
        if owner != *from {
            return Err(RegistryError::NotOwner { key: *key });
        }
        if operator != from && self.approvals.get(key) != Some(operator) {
            return Err(RegistryError::NotApproved { key: *key });
        }

        self.owners.insert(*key, *to);
        // a stale approval must not survive the ownership change
        self.approvals.remove(key);
        Ok(())
    }
}
