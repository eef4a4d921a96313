//! End-to-End Settlement Tests
//!
//! Exercises the whole order lifecycle through the public surface:
//! - listing-to-settlement walkthrough against live registry and ledger
//! - order book views across sellers
//! - settlement safety: stale orders, expiry boundary, double purchase
//! - restart durability through the journaled wrapper
//! - fuzzed conservation and boundary properties (proptest)

use contracts::ledger::{CurrencyLedger, TokenLedger};
use contracts::registry::{AssetRegistry, TokenRegistry};
use marketplace::errors::MarketError;
use marketplace::{DurableMarketplace, Marketplace, StorageConfig};
use rust_decimal::Decimal;
use tempfile::TempDir;
use types::asset::AssetKey;
use types::ids::{AccountId, CollectionId, CurrencyId};
use types::numeric::Price;

const NOW: i64 = 1_700_000_000;
const HOUR: i64 = 3_600;
/// One whole coin of an 18-decimal currency, in smallest units.
const ONE_COIN: u64 = 1_000_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════
// Test Fixtures
// ═══════════════════════════════════════════════════════════════════

struct Market {
    market: Marketplace,
    registry: TokenRegistry,
    ledger: TokenLedger,
    admin: AccountId,
    seller: AccountId,
    buyer: AccountId,
    collection: CollectionId,
    weth: CurrencyId,
}

/// Market with WETH whitelisted and a buyer holding ten coins plus a
/// matching allowance to the marketplace.
fn setup_market() -> Market {
    let admin = AccountId::new();
    let market_id = AccountId::new();
    let mut market = Marketplace::new(admin, market_id);

    let mut registry = TokenRegistry::new();
    let collection = registry.register_collection("Game Items", "ITEM");

    let mut ledger = TokenLedger::new();
    let seller = AccountId::new();
    let buyer = AccountId::new();
    let weth = CurrencyId::from("WETH");

    let funds = Decimal::from(10) * Decimal::from(ONE_COIN);
    market.add_currency(admin, weth.clone()).unwrap();
    ledger.mint(&weth, buyer, funds).unwrap();
    ledger.approve(&weth, &buyer, market_id, funds).unwrap();

    Market {
        market,
        registry,
        ledger,
        admin,
        seller,
        buyer,
        collection,
        weth,
    }
}

impl Market {
    fn list_as(&mut self, seller: AccountId, price: u64, expires_at: i64) -> AssetKey {
        let key = self
            .registry
            .mint(self.collection, seller, "https://assets.example/meta.json")
            .unwrap();
        self.registry
            .approve(&key, self.market.market_id(), &seller)
            .unwrap();
        self.market
            .create_order(
                &self.registry,
                seller,
                key,
                Price::from_units(price),
                self.weth.clone(),
                expires_at,
                NOW,
            )
            .unwrap();
        key
    }

    fn list(&mut self, price: u64, expires_at: i64) -> AssetKey {
        self.list_as(self.seller, price, expires_at)
    }

    fn balance(&self, account: AccountId) -> Decimal {
        self.ledger.balance_of(&self.weth, &account)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Listing-to-Settlement Walkthrough
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_full_listing_to_settlement_flow() {
    let mut m = setup_market();

    // Seller mints a game item and approves the marketplace operator.
    let key = m
        .registry
        .mint(
            m.collection,
            m.seller,
            "https://game.example/item-id-8u5h2m.json",
        )
        .unwrap();
    m.registry
        .approve(&key, m.market.market_id(), &m.seller)
        .unwrap();

    // Listed for one coin, valid for ten hours.
    let order = m
        .market
        .create_order(
            &m.registry,
            m.seller,
            key,
            Price::from_units(ONE_COIN),
            m.weth.clone(),
            NOW + 10 * HOUR,
            NOW,
        )
        .unwrap();
    assert_eq!(order.key, key);
    assert_eq!(m.market.list_orders().len(), 1);
    // Listing records intent only; the asset stays with the seller.
    assert_eq!(m.registry.owner_of(&key).unwrap(), m.seller);

    // Purchase two hours later.
    let bought = m
        .market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            m.buyer,
            key,
            Price::from_units(ONE_COIN),
            NOW + 2 * HOUR,
        )
        .unwrap();
    assert_eq!(bought.seller, m.seller);

    // Asset moved, payment moved, order gone.
    assert_eq!(m.registry.owner_of(&key).unwrap(), m.buyer);
    assert_eq!(
        m.registry.token_uri(&key),
        Some("https://game.example/item-id-8u5h2m.json")
    );
    assert_eq!(m.balance(m.seller), Decimal::from(ONE_COIN));
    assert_eq!(
        m.balance(m.buyer),
        Decimal::from(9) * Decimal::from(ONE_COIN)
    );
    assert!(m.market.list_orders().is_empty());
    assert!(m.market.order(&key).is_none());

    // Settlement consumed exactly the price from the standing allowance.
    assert_eq!(
        m.ledger.allowance(&m.weth, &m.buyer, &m.market.market_id()),
        Decimal::from(9) * Decimal::from(ONE_COIN)
    );

    // Committed history, in commit order.
    let labels: Vec<&str> = m.market.events().iter().map(|e| e.label()).collect();
    assert_eq!(labels, vec!["CurrencyAdded", "OrderCreated", "OrderSettled"]);
}

// ═══════════════════════════════════════════════════════════════════
// Order Book Views
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_order_book_views_follow_insertion_order() {
    let mut m = setup_market();
    let alice = m.seller;
    let bob = AccountId::new();

    let a1 = m.list_as(alice, 10, NOW + HOUR);
    let b1 = m.list_as(bob, 20, NOW + HOUR);
    let a2 = m.list_as(alice, 30, NOW + 2 * HOUR);

    let all: Vec<AssetKey> = m.market.list_orders().iter().map(|o| o.key).collect();
    assert_eq!(all, vec![a1, b1, a2]);

    let alices: Vec<AssetKey> = m
        .market
        .list_orders_by_seller(alice)
        .iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(alices, vec![a1, a2]);

    let bobs: Vec<AssetKey> = m
        .market
        .list_orders_by_seller(bob)
        .iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(bobs, vec![b1]);

    assert!(m.market.list_orders_by_seller(AccountId::new()).is_empty());
}

#[test]
fn test_relist_after_cancel() {
    let mut m = setup_market();
    let key = m.list(100, NOW + HOUR);
    m.market.cancel_order(m.seller, key).unwrap();

    // The registry approval survives cancellation, so the seller can
    // relist at a new price immediately.
    m.market
        .create_order(
            &m.registry,
            m.seller,
            key,
            Price::from_units(150),
            m.weth.clone(),
            NOW + 2 * HOUR,
            NOW,
        )
        .unwrap();
    assert_eq!(m.market.order(&key).unwrap().price, Price::from_units(150));
}

#[test]
fn test_expired_order_purged_then_relisted() {
    let mut m = setup_market();
    let key = m.list(100, NOW + HOUR);

    // Expired: buyers are turned away but the listing stays visible.
    let err = m
        .market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            m.buyer,
            key,
            Price::from_units(100),
            NOW + 2 * HOUR,
        )
        .unwrap_err();
    assert!(matches!(err, MarketError::OrderExpired { .. }));
    assert_eq!(m.market.order_count(), 1);

    let purged = m.market.purge_expired(m.admin, NOW + 2 * HOUR).unwrap();
    assert_eq!(purged.len(), 1);
    assert_eq!(m.market.order_count(), 0);

    // The freed slot accepts a fresh listing.
    m.market
        .create_order(
            &m.registry,
            m.seller,
            key,
            Price::from_units(80),
            m.weth.clone(),
            NOW + 3 * HOUR,
            NOW + 2 * HOUR,
        )
        .unwrap();
    assert_eq!(m.market.order(&key).unwrap().price, Price::from_units(80));
}

// ═══════════════════════════════════════════════════════════════════
// Settlement Safety
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_second_buyer_finds_no_order() {
    let mut m = setup_market();
    let key = m.list(100, NOW + HOUR);

    let rival = AccountId::new();
    m.ledger.mint(&m.weth, rival, Decimal::from(500)).unwrap();
    m.ledger
        .approve(&m.weth, &rival, m.market.market_id(), Decimal::from(500))
        .unwrap();

    m.market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            m.buyer,
            key,
            Price::from_units(100),
            NOW,
        )
        .unwrap();

    // The order is gone; the rival pays nothing.
    let err = m
        .market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            rival,
            key,
            Price::from_units(100),
            NOW,
        )
        .unwrap_err();
    assert_eq!(err, MarketError::OrderNotFound { key });
    assert_eq!(m.balance(rival), Decimal::from(500));
    assert_eq!(m.registry.owner_of(&key).unwrap(), m.buyer);
}

#[test]
fn test_stale_order_costs_the_buyer_nothing() {
    let mut m = setup_market();
    let key = m.list(100, NOW + HOUR);

    // The seller moves the asset outside the marketplace.
    let elsewhere = AccountId::new();
    m.registry
        .transfer(&key, &m.seller, &elsewhere, &m.seller)
        .unwrap();

    let funds_before = m.balance(m.buyer);
    let allowance_before = m.ledger.allowance(&m.weth, &m.buyer, &m.market.market_id());

    let result = m.market.buy(
        &mut m.registry,
        &mut m.ledger,
        m.buyer,
        key,
        Price::from_units(100),
        NOW,
    );
    assert!(result.is_err());

    // Rejected before the payment leg: balance and allowance intact.
    assert_eq!(m.balance(m.buyer), funds_before);
    assert_eq!(
        m.ledger.allowance(&m.weth, &m.buyer, &m.market.market_id()),
        allowance_before
    );
}

#[test]
fn test_purchasable_through_expiry_instant() {
    let mut m = setup_market();
    let at_limit = m.list(10, NOW + HOUR);
    let just_past = m.list(20, NOW + HOUR);

    // At the expiry instant the order still settles.
    m.market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            m.buyer,
            at_limit,
            Price::from_units(10),
            NOW + HOUR,
        )
        .unwrap();

    // One tick later it does not.
    let err = m
        .market
        .buy(
            &mut m.registry,
            &mut m.ledger,
            m.buyer,
            just_past,
            Price::from_units(20),
            NOW + HOUR + 1,
        )
        .unwrap_err();
    assert!(matches!(err, MarketError::OrderExpired { .. }));
}

// ═══════════════════════════════════════════════════════════════════
// Restart Durability
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_order_book_survives_restart_mid_lifecycle() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::new(dir.path());

    let admin = AccountId::new();
    let market_id = AccountId::new();
    let seller = AccountId::new();
    let buyer = AccountId::new();
    let weth = CurrencyId::from("WETH");

    let mut registry = TokenRegistry::new();
    let collection = registry.register_collection("Game Items", "ITEM");
    let mut ledger = TokenLedger::new();
    ledger.mint(&weth, buyer, Decimal::from(1_000)).unwrap();
    ledger
        .approve(&weth, &buyer, market_id, Decimal::from(1_000))
        .unwrap();

    let key = registry
        .mint(collection, seller, "https://game.example/item-id-8u5h2m.json")
        .unwrap();
    registry.approve(&key, market_id, &seller).unwrap();

    // Session one: whitelist the currency and list the asset.
    {
        let mut market = DurableMarketplace::open(config.clone(), admin, market_id).unwrap();
        market.add_currency(admin, weth.clone()).unwrap();
        market
            .create_order(
                &registry,
                seller,
                key,
                Price::from_units(400),
                weth.clone(),
                NOW + 10 * HOUR,
                NOW,
            )
            .unwrap();
    }

    // Session two: the restored book settles the order.
    {
        let mut market = DurableMarketplace::open(config.clone(), admin, market_id).unwrap();
        assert!(market.is_whitelisted(&weth));
        assert_eq!(market.order_count(), 1);
        market
            .buy(
                &mut registry,
                &mut ledger,
                buyer,
                key,
                Price::from_units(400),
                NOW + HOUR,
            )
            .unwrap();
    }

    // Session three: the settlement survived too.
    let market = DurableMarketplace::open(config, admin, market_id).unwrap();
    assert_eq!(market.order_count(), 0);
    assert_eq!(registry.owner_of(&key).unwrap(), buyer);
    assert_eq!(ledger.balance_of(&weth, &seller), Decimal::from(400));
}

// ═══════════════════════════════════════════════════════════════════
// Fuzzed Properties
// ═══════════════════════════════════════════════════════════════════

mod fuzz {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn settlement_conserves_total_supply(price in 0u64..1_000_000, hold in 0i64..10_000) {
            let mut m = setup_market();
            let key = m.list(price, NOW + HOUR + hold);

            let before = m.balance(m.seller) + m.balance(m.buyer);
            m.market
                .buy(
                    &mut m.registry,
                    &mut m.ledger,
                    m.buyer,
                    key,
                    Price::from_units(price),
                    NOW + HOUR,
                )
                .unwrap();

            prop_assert_eq!(m.balance(m.seller) + m.balance(m.buyer), before);
            prop_assert_eq!(m.balance(m.seller), Decimal::from(price));
            prop_assert_eq!(m.registry.owner_of(&key).unwrap(), m.buyer);
        }

        #[test]
        fn expiry_boundary_is_exact(offset in -5_000i64..5_000) {
            let mut m = setup_market();
            let expires_at = NOW + HOUR;
            let key = m.list(50, expires_at);

            let result = m.market.buy(
                &mut m.registry,
                &mut m.ledger,
                m.buyer,
                key,
                Price::from_units(50),
                expires_at + offset,
            );
            if offset <= 0 {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(
                    matches!(result, Err(MarketError::OrderExpired { .. })),
                    "expected OrderExpired, got {:?}",
                    result
                );
                prop_assert!(m.market.order(&key).is_some());
            }
        }

        #[test]
        fn wrong_price_never_settles(
            (listed, submitted) in (0u64..1_000_000, 0u64..1_000_000)
                .prop_filter("prices must differ", |(a, b)| a != b),
        ) {
            let mut m = setup_market();
            let key = m.list(listed, NOW + HOUR);
            let funds_before = m.balance(m.buyer);

            let result = m.market.buy(
                &mut m.registry,
                &mut m.ledger,
                m.buyer,
                key,
                Price::from_units(submitted),
                NOW,
            );
            prop_assert!(
                matches!(result, Err(MarketError::PriceMismatch { .. })),
                "expected PriceMismatch, got {:?}",
                result
            );
            prop_assert_eq!(m.balance(m.buyer), funds_before);
            prop_assert!(m.market.order(&key).is_some());
        }
    }
}
