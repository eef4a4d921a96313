//! Order Lifecycle Engine — creation, purchase, cancellation, expiry
//!
//! Owns the order store, the currency whitelist, and the admin role:
//! - admin-gated whitelist edits, creation-time membership checks
//! - order creation with ownership and approval validation
//! - atomic settlement: payment via ledger allowance, then asset
//!   transfer, then order removal
//! - lazy expiry with an explicit admin purge
//!
//! All mutating operations take `&mut self`: state transitions execute
//! one at a time in submission order, and nothing observes a
//! half-applied transition. Collaborator registries and ledgers are
//! passed per call so the engine never owns external state.

use contracts::errors::RegistryError;
use contracts::ledger::CurrencyLedger;
use contracts::registry::AssetRegistry;
use tracing::{error, info, warn};
use types::asset::AssetKey;
use types::ids::{AccountId, CurrencyId};
use types::numeric::Price;
use types::order::Order;

use crate::errors::MarketError;
use crate::events::{
    AdminTransferred, CurrencyAdded, CurrencyRemoved, MarketEvent, OrderCancelled, OrderCreated,
    OrderExpired, OrderSettled,
};
use crate::security::AccessControl;
use crate::store::OrderStore;
use crate::whitelist::CurrencyWhitelist;

/// Fixed-price order book over externally-owned assets and currencies.
///
/// `market_id` is the marketplace's own account identity: the operator
/// sellers approve in the asset registry and the spender buyers grant
/// allowance to in the currency ledger.
#[derive(Debug)]
pub struct Marketplace {
    market_id: AccountId,
    access: AccessControl,
    whitelist: CurrencyWhitelist,
    store: OrderStore,
    /// Emitted events log (append-only until drained)
    events: Vec<MarketEvent>,
}

impl Marketplace {
    /// Open a market run by `admin`, transacting as `market_id`.
    pub fn new(admin: AccountId, market_id: AccountId) -> Self {
        Self {
            market_id,
            access: AccessControl::new(admin),
            whitelist: CurrencyWhitelist::new(),
            store: OrderStore::new(),
            events: Vec::new(),
        }
    }

    /// Rebuild an engine from recovered state. Orders and currencies
    /// are trusted as-is; collaborator checks do not rerun.
    pub(crate) fn restore(
        admin: AccountId,
        market_id: AccountId,
        currencies: Vec<CurrencyId>,
        orders: Vec<Order>,
    ) -> Self {
        let mut whitelist = CurrencyWhitelist::new();
        for currency in currencies {
            whitelist.add(currency);
        }
        let mut store = OrderStore::new();
        for order in orders {
            store.insert(order);
        }
        Self {
            market_id,
            access: AccessControl::new(admin),
            whitelist,
            store,
            events: Vec::new(),
        }
    }

    pub fn admin(&self) -> AccountId {
        self.access.admin()
    }

    pub fn market_id(&self) -> AccountId {
        self.market_id
    }

    // ───────────────────────── Currency Whitelist ─────────────────────────

    /// Whitelist a currency for new orders. Admin-only, idempotent.
    pub fn add_currency(
        &mut self,
        caller: AccountId,
        currency: CurrencyId,
    ) -> Result<(), MarketError> {
        self.check_admin(caller)?;
        if self.whitelist.add(currency.clone()) {
            info!(currency = %currency, "Currency whitelisted");
            self.events
                .push(MarketEvent::CurrencyAdded(CurrencyAdded { currency }));
        }
        Ok(())
    }

    /// Drop a currency from the whitelist. Admin-only, idempotent.
    /// Orders already denominated in it are untouched.
    pub fn remove_currency(
        &mut self,
        caller: AccountId,
        currency: CurrencyId,
    ) -> Result<(), MarketError> {
        self.check_admin(caller)?;
        if self.whitelist.remove(&currency) {
            info!(currency = %currency, "Currency removed from whitelist");
            self.events
                .push(MarketEvent::CurrencyRemoved(CurrencyRemoved { currency }));
        }
        Ok(())
    }

    /// Whitelisted currencies in insertion order.
    pub fn currencies(&self) -> &[CurrencyId] {
        self.whitelist.as_slice()
    }

    pub fn is_whitelisted(&self, currency: &CurrencyId) -> bool {
        self.whitelist.contains(currency)
    }

    // ───────────────────────── Administration ─────────────────────────

    /// Hand the admin role to another account. Admin-only.
    pub fn transfer_admin(
        &mut self,
        caller: AccountId,
        new_admin: AccountId,
    ) -> Result<(), MarketError> {
        self.check_admin(caller)?;
        if new_admin == caller {
            return Ok(());
        }
        self.access.set_admin(new_admin);
        info!(previous = %caller, new = %new_admin, "Admin role transferred");
        self.events.push(MarketEvent::AdminTransferred(AdminTransferred {
            previous: caller,
            new: new_admin,
        }));
        Ok(())
    }

    // ───────────────────────── Order Creation ─────────────────────────

    /// List an asset for sale at a fixed price.
    ///
    /// Preconditions, first failure wins: currency whitelisted, no
    /// active order for the asset, caller owns the asset, the
    /// marketplace holds transfer approval, expiry strictly in the
    /// future. Creation records intent only; the asset stays with the
    /// seller until purchase.
    #[allow(clippy::too_many_arguments)]
    pub fn create_order(
        &mut self,
        registry: &impl AssetRegistry,
        caller: AccountId,
        key: AssetKey,
        price: Price,
        currency: CurrencyId,
        expires_at: i64,
        current_time: i64,
    ) -> Result<Order, MarketError> {
        if !self.whitelist.contains(&currency) {
            return Err(MarketError::UnsupportedCurrency { currency });
        }
        if self.store.contains(&key) {
            return Err(MarketError::OrderAlreadyExists { key });
        }
        if registry.owner_of(&key)? != caller {
            return Err(MarketError::NotOwner { key, caller });
        }
        if !registry.is_approved(&key, &self.market_id)? {
            return Err(MarketError::NotApproved {
                key,
                operator: self.market_id,
            });
        }
        if expires_at <= current_time {
            return Err(MarketError::InvalidExpiration {
                expires_at,
                current_time,
            });
        }

        let order = Order::new(key, caller, price, currency, expires_at, current_time);
        self.store.insert(order.clone());
        debug_assert!(self.store.indexes_consistent());

        info!(
            key = %key,
            seller = %caller,
            price = %order.price,
            currency = %order.currency,
            expires_at = order.expires_at,
            "Order created"
        );
        self.events
            .push(MarketEvent::OrderCreated(OrderCreated::from(&order)));
        Ok(order)
    }

    // ───────────────────────── Purchase ─────────────────────────

    /// Buy a listed asset, settling payment and ownership atomically.
    ///
    /// The submitted `price` must equal the listed price exactly; this
    /// defends against stale-price submission. The asset leg is
    /// preflighted (seller still owns, approval still held) before any
    /// payment moves, so stale orders reject with nothing transferred.
    pub fn buy(
        &mut self,
        registry: &mut impl AssetRegistry,
        ledger: &mut impl CurrencyLedger,
        caller: AccountId,
        key: AssetKey,
        price: Price,
        current_time: i64,
    ) -> Result<Order, MarketError> {
        let order = match self.store.get(&key) {
            Some(order) => order.clone(),
            None => return Err(MarketError::OrderNotFound { key }),
        };

        if order.is_expired(current_time) {
            warn!(
                key = %key,
                expires_at = order.expires_at,
                now = current_time,
                "Purchase of expired order rejected"
            );
            return Err(MarketError::OrderExpired {
                key,
                expires_at: order.expires_at,
            });
        }
        if price != order.price {
            warn!(
                key = %key,
                listed = %order.price,
                submitted = %price,
                "Purchase price mismatch rejected"
            );
            return Err(MarketError::PriceMismatch {
                expected: order.price,
                submitted: price,
            });
        }

        // Stale-order preflight: the order may outlive the approval or
        // even the seller's ownership. Both must hold before payment.
        if registry.owner_of(&key)? != order.seller {
            warn!(key = %key, seller = %order.seller, "Listed asset no longer held by seller");
            return Err(MarketError::Registry(RegistryError::NotOwner { key }));
        }
        if !registry.is_approved(&key, &self.market_id)? {
            warn!(key = %key, "Transfer approval revoked after listing");
            return Err(MarketError::Registry(RegistryError::NotApproved { key }));
        }

        // Payment leg. A rejection here leaves every balance and the
        // order untouched.
        ledger.transfer_from(
            &order.currency,
            &caller,
            &order.seller,
            order.price.as_decimal(),
            &self.market_id,
        )?;

        // Asset leg. The preflight plus serialized execution makes a
        // conforming registry unable to fail here; a registry that does
        // anyway has broken its approval contract, and the payment
        // cannot be clawed back through the allowance model.
        if let Err(err) = registry.transfer(&key, &order.seller, &caller, &self.market_id) {
            error!(
                key = %key,
                seller = %order.seller,
                buyer = %caller,
                error = %err,
                "Asset transfer failed after payment; registry violated its approval contract"
            );
            return Err(MarketError::Registry(err));
        }

        self.store.remove(&key);
        debug_assert!(self.store.indexes_consistent());

        info!(
            key = %key,
            seller = %order.seller,
            buyer = %caller,
            price = %order.price,
            currency = %order.currency,
            "Order settled"
        );
        self.events.push(MarketEvent::OrderSettled(OrderSettled {
            key,
            seller: order.seller,
            buyer: caller,
            price: order.price,
            currency: order.currency.clone(),
        }));
        Ok(order)
    }

    // ───────────────────────── Cancellation ─────────────────────────

    /// Withdraw an order. Only the seller may cancel; expired orders
    /// can still be cancelled. No funds move.
    pub fn cancel_order(
        &mut self,
        caller: AccountId,
        key: AssetKey,
    ) -> Result<Order, MarketError> {
        let seller = match self.store.get(&key) {
            Some(order) => order.seller,
            None => return Err(MarketError::OrderNotFound { key }),
        };
        if seller != caller {
            return Err(MarketError::Unauthorized { caller });
        }

        let order = match self.store.remove(&key) {
            Some(order) => order,
            None => return Err(MarketError::OrderNotFound { key }),
        };
        debug_assert!(self.store.indexes_consistent());

        info!(key = %key, seller = %seller, "Order cancelled");
        self.events
            .push(MarketEvent::OrderCancelled(OrderCancelled { key, seller }));
        Ok(order)
    }

    // ───────────────────────── Expiry ─────────────────────────

    /// Remove every order past its expiry. Admin-only; expiry is
    /// otherwise evaluated lazily at purchase time, so this is the only
    /// way expired orders leave the store.
    pub fn purge_expired(
        &mut self,
        caller: AccountId,
        current_time: i64,
    ) -> Result<Vec<Order>, MarketError> {
        self.check_admin(caller)?;

        let mut purged = Vec::new();
        for key in self.store.expired_keys(current_time) {
            if let Some(order) = self.store.remove(&key) {
                self.events.push(MarketEvent::OrderExpired(OrderExpired {
                    key,
                    seller: order.seller,
                }));
                purged.push(order);
            }
        }
        debug_assert!(self.store.indexes_consistent());

        if !purged.is_empty() {
            info!(removed = purged.len(), now = current_time, "Expired orders purged");
        }
        Ok(purged)
    }

    // ───────────────────────── Read Surface ─────────────────────────

    /// Snapshot of all active orders, oldest listing first.
    pub fn list_orders(&self) -> Vec<Order> {
        self.store.all().cloned().collect()
    }

    /// Snapshot of one seller's active orders, oldest listing first.
    pub fn list_orders_by_seller(&self, seller: AccountId) -> Vec<Order> {
        self.store.by_seller(seller).cloned().collect()
    }

    pub fn order(&self, key: &AssetKey) -> Option<&Order> {
        self.store.get(key)
    }

    pub fn order_count(&self) -> usize {
        self.store.len()
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<MarketEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal Guards ─────────────────────────

    fn check_admin(&self, caller: AccountId) -> Result<(), MarketError> {
        if !self.access.is_admin(caller) {
            warn!(caller = %caller, "Administrative call from non-admin rejected");
            return Err(MarketError::Unauthorized { caller });
        }
        Ok(())
    }
}
