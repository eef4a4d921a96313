//! Currency whitelist gating order creation
//!
//! Membership is consulted when an order is created and never again:
//! removing a currency leaves orders already denominated in it fully
//! purchasable. Listing preserves insertion order because the set is
//! part of the public read surface.

use std::collections::HashSet;
use types::ids::CurrencyId;

#[derive(Debug, Clone, Default)]
pub struct CurrencyWhitelist {
    /// Insertion-ordered view returned to callers.
    ordered: Vec<CurrencyId>,
    /// Membership index.
    members: HashSet<CurrencyId>,
}

impl CurrencyWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a currency. Returns `true` if it was newly added.
    pub fn add(&mut self, currency: CurrencyId) -> bool {
        if !self.members.insert(currency.clone()) {
            return false;
        }
        self.ordered.push(currency);
        true
    }

    /// Remove a currency. Returns `true` if it was present.
    pub fn remove(&mut self, currency: &CurrencyId) -> bool {
        if !self.members.remove(currency) {
            return false;
        }
        self.ordered.retain(|c| c != currency);
        true
    }

    pub fn contains(&self, currency: &CurrencyId) -> bool {
        self.members.contains(currency)
    }

    /// Currencies in the order they were whitelisted.
    pub fn as_slice(&self) -> &[CurrencyId] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
