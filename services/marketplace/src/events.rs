//! Marketplace events
//!
//! Immutable records emitted by engine operations, in the order the
//! operations committed. The event stream is also the journal payload:
//! replaying it alone rebuilds the order store, the whitelist, and the
//! admin identity, which is why `OrderCreated` carries the complete
//! order record rather than just its key.

use serde::{Deserialize, Serialize};
use types::asset::AssetKey;
use types::ids::{AccountId, CurrencyId};
use types::numeric::Price;
use types::order::Order;

/// Market instance came into existence. Journaled exactly once, as the
/// first frame of a fresh journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOpened {
    pub admin: AccountId,
    pub market_id: AccountId,
}

/// Currency became eligible to back new orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAdded {
    pub currency: CurrencyId,
}

/// Currency no longer eligible for new orders. Existing orders in this
/// currency stay purchasable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyRemoved {
    pub currency: CurrencyId,
}

/// Order accepted into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub key: AssetKey,
    pub seller: AccountId,
    pub price: Price,
    pub currency: CurrencyId,
    pub expires_at: i64,
    pub created_at: i64,
}

impl From<&Order> for OrderCreated {
    fn from(order: &Order) -> Self {
        Self {
            key: order.key,
            seller: order.seller,
            price: order.price,
            currency: order.currency.clone(),
            expires_at: order.expires_at,
            created_at: order.created_at,
        }
    }
}

impl From<&OrderCreated> for Order {
    fn from(event: &OrderCreated) -> Self {
        Order::new(
            event.key,
            event.seller,
            event.price,
            event.currency.clone(),
            event.expires_at,
            event.created_at,
        )
    }
}

/// Purchase settled: payment moved to the seller, the asset moved to
/// the buyer, and the order left the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettled {
    pub key: AssetKey,
    pub seller: AccountId,
    pub buyer: AccountId,
    pub price: Price,
    pub currency: CurrencyId,
}

/// Seller withdrew the order. No funds moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub key: AssetKey,
    pub seller: AccountId,
}

/// Expired order removed by an administrative purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub key: AssetKey,
    pub seller: AccountId,
}

/// Administrator role handed to another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminTransferred {
    pub previous: AccountId,
    pub new: AccountId,
}

/// Enum wrapper for all marketplace events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketEvent {
    MarketOpened(MarketOpened),
    CurrencyAdded(CurrencyAdded),
    CurrencyRemoved(CurrencyRemoved),
    OrderCreated(OrderCreated),
    OrderSettled(OrderSettled),
    OrderCancelled(OrderCancelled),
    OrderExpired(OrderExpired),
    AdminTransferred(AdminTransferred),
}

impl MarketEvent {
    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            MarketEvent::MarketOpened(_) => "MarketOpened",
            MarketEvent::CurrencyAdded(_) => "CurrencyAdded",
            MarketEvent::CurrencyRemoved(_) => "CurrencyRemoved",
            MarketEvent::OrderCreated(_) => "OrderCreated",
            MarketEvent::OrderSettled(_) => "OrderSettled",
            MarketEvent::OrderCancelled(_) => "OrderCancelled",
            MarketEvent::OrderExpired(_) => "OrderExpired",
            MarketEvent::AdminTransferred(_) => "AdminTransferred",
        }
    }
}
