//! Order store: one source of truth, two derived indexes
//!
//! Orders live in a primary map keyed by asset. Two indexes are
//! maintained alongside it: the global insertion-order listing and the
//! per-seller grouping. Every mutation updates all three together; the
//! `indexes_consistent` probe exists so tests and debug builds can
//! check that nothing diverged, including after rejected operations.

use std::collections::{BTreeMap, HashMap};
use types::asset::AssetKey;
use types::ids::AccountId;
use types::order::Order;

#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    /// Authoritative mapping: at most one active order per asset.
    orders: BTreeMap<AssetKey, Order>,
    /// All active keys, oldest listing first.
    sequence: Vec<AssetKey>,
    /// Active keys per seller, oldest listing first. A seller with no
    /// orders has no entry.
    by_seller: HashMap<AccountId, Vec<AssetKey>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new order. Returns `false`, changing nothing, if the
    /// asset already has an active order.
    pub fn insert(&mut self, order: Order) -> bool {
        let key = order.key;
        if self.orders.contains_key(&key) {
            return false;
        }
        let seller = order.seller;
        self.orders.insert(key, order);
        self.sequence.push(key);
        self.by_seller.entry(seller).or_default().push(key);
        true
    }

    /// Remove an order, detaching it from both indexes.
    pub fn remove(&mut self, key: &AssetKey) -> Option<Order> {
        let order = self.orders.remove(key)?;
        self.sequence.retain(|k| k != key);
        if let Some(keys) = self.by_seller.get_mut(&order.seller) {
            keys.retain(|k| k != key);
            if keys.is_empty() {
                self.by_seller.remove(&order.seller);
            }
        }
        Some(order)
    }

    pub fn get(&self, key: &AssetKey) -> Option<&Order> {
        self.orders.get(key)
    }

    pub fn contains(&self, key: &AssetKey) -> bool {
        self.orders.contains_key(key)
    }

    /// All active orders, oldest listing first.
    pub fn all(&self) -> impl Iterator<Item = &Order> {
        self.sequence.iter().filter_map(|key| self.orders.get(key))
    }

    /// A seller's active orders, oldest listing first. Empty for
    /// sellers with no orders.
    pub fn by_seller(&self, seller: AccountId) -> impl Iterator<Item = &Order> {
        self.by_seller
            .get(&seller)
            .into_iter()
            .flatten()
            .filter_map(|key| self.orders.get(key))
    }

    /// Keys of orders past their expiry, oldest listing first.
    pub fn expired_keys(&self, now: i64) -> Vec<AssetKey> {
        self.sequence
            .iter()
            .filter(|key| {
                self.orders
                    .get(key)
                    .map(|order| order.is_expired(now))
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Verify that both indexes mirror the primary map exactly.
    pub fn indexes_consistent(&self) -> bool {
        if self.sequence.len() != self.orders.len() {
            return false;
        }
        let mut seen = std::collections::HashSet::new();
        for key in &self.sequence {
            if !seen.insert(*key) || !self.orders.contains_key(key) {
                return false;
            }
        }

        let grouped: usize = self.by_seller.values().map(|keys| keys.len()).sum();
        if grouped != self.orders.len() {
            return false;
        }
        for (seller, keys) in &self.by_seller {
            if keys.is_empty() {
                return false;
            }
            for key in keys {
                match self.orders.get(key) {
                    Some(order) if order.seller == *seller => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
