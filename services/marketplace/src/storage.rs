//! Durable Marketplace — journaled operations with snapshot recovery
//!
//! Wraps the in-memory engine with the persistence crate:
//! - every committed operation's events are appended to the operation
//!   log before the caller sees success; rejected operations append
//!   nothing
//! - state snapshots bound replay time; journal files fully covered by
//!   a snapshot are pruned
//! - `open` recovers the latest snapshot plus the contiguous journal
//!   tail, so the order book and whitelist survive restarts
//!
//! The very first open of a data directory journals a genesis
//! `MarketOpened` event carrying the market identity; later opens
//! ignore the identity arguments and restore from disk.

use chrono::Utc;
use persistence::journal::{FlushPolicy, FsyncPolicy, LogConfig, LogEntry, LogError, LogWriter};
use persistence::reader::LogReader;
use persistence::recovery::{RecoveryEngine, RecoveryError, ReplayError, ReplayHandler};
use persistence::snapshot::{SnapshotError, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use contracts::ledger::CurrencyLedger;
use contracts::registry::AssetRegistry;
use types::asset::AssetKey;
use types::ids::{AccountId, CurrencyId};
use types::numeric::Price;
use types::order::Order;

use crate::engine::Marketplace;
use crate::errors::MarketError;
use crate::events::{MarketEvent, MarketOpened};

// ───────────────────────── Errors ─────────────────────────

/// Failures in the durability layer, as opposed to market-rule
/// rejections.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Journal error: {0}")]
    Log(#[from] LogError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Event encoding failed: {0}")]
    Encode(String),

    #[error("Storage poisoned by an earlier write failure; reopen to recover")]
    Poisoned,
}

/// Error surface of the durable marketplace: either the market rules
/// rejected the operation (state unchanged, nothing journaled) or the
/// durability layer failed.
#[derive(Error, Debug)]
pub enum DurableError {
    #[error("{0}")]
    Market(#[from] MarketError),

    #[error("{0}")]
    Storage(#[from] StorageError),
}

// ───────────────────────── Configuration ─────────────────────────

/// Layout and policy knobs for one marketplace data directory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory; the journal and snapshots live beneath it.
    pub data_dir: PathBuf,
    /// Journaled events between automatic snapshots. Zero disables
    /// automatic snapshots; explicit `snapshot()` calls still work.
    pub snapshot_interval: u64,
    /// Snapshot files kept on disk after each new one.
    pub snapshots_retained: usize,
    pub compress_snapshots: bool,
    pub max_journal_file_bytes: u64,
    pub flush_policy: FlushPolicy,
    pub fsync_policy: FsyncPolicy,
}

impl StorageConfig {
    /// Durable defaults: flush and fsync on every entry.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            snapshot_interval: 10_000,
            snapshots_retained: 4,
            compress_snapshots: true,
            max_journal_file_bytes: 16 * 1024 * 1024,
            flush_policy: FlushPolicy::EveryEntry,
            fsync_policy: FsyncPolicy::EveryEntry,
        }
    }

    pub fn journal_dir(&self) -> PathBuf {
        self.data_dir.join("journal")
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }
}

// ───────────────────────── Replayable State ─────────────────────────

/// Serializable image of the full market state, used for snapshots and
/// as the accumulator during journal replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub admin: AccountId,
    pub market_id: AccountId,
    pub currencies: Vec<CurrencyId>,
    pub orders: Vec<Order>,
}

impl Default for MarketState {
    fn default() -> Self {
        Self {
            admin: AccountId::from_uuid(Uuid::nil()),
            market_id: AccountId::from_uuid(Uuid::nil()),
            currencies: Vec::new(),
            orders: Vec::new(),
        }
    }
}

impl MarketState {
    /// Fold one committed event into the state. Pure: no clocks, no IO,
    /// so replaying the same history always lands on the same state.
    pub fn apply(&mut self, event: &MarketEvent) {
        match event {
            MarketEvent::MarketOpened(opened) => {
                self.admin = opened.admin;
                self.market_id = opened.market_id;
            }
            MarketEvent::CurrencyAdded(added) => {
                if !self.currencies.contains(&added.currency) {
                    self.currencies.push(added.currency.clone());
                }
            }
            MarketEvent::CurrencyRemoved(removed) => {
                self.currencies.retain(|currency| currency != &removed.currency);
            }
            MarketEvent::OrderCreated(created) => {
                self.orders.push(Order::from(created));
            }
            MarketEvent::OrderSettled(settled) => {
                self.orders.retain(|order| order.key != settled.key);
            }
            MarketEvent::OrderCancelled(cancelled) => {
                self.orders.retain(|order| order.key != cancelled.key);
            }
            MarketEvent::OrderExpired(expired) => {
                self.orders.retain(|order| order.key != expired.key);
            }
            MarketEvent::AdminTransferred(transferred) => {
                self.admin = transferred.new;
            }
        }
    }

    fn capture(market: &Marketplace) -> Self {
        Self {
            admin: market.admin(),
            market_id: market.market_id(),
            currencies: market.currencies().to_vec(),
            orders: market.list_orders(),
        }
    }
}

/// Decodes journal payloads back into market events during recovery.
pub struct MarketReplayer;

impl ReplayHandler<MarketState> for MarketReplayer {
    fn apply(&self, state: &mut MarketState, entry: &LogEntry) -> Result<(), ReplayError> {
        let event: MarketEvent =
            bincode::deserialize(&entry.payload).map_err(|err| ReplayError::Malformed {
                sequence: entry.sequence,
                detail: err.to_string(),
            })?;
        debug!(
            sequence = entry.sequence,
            event_type = event.label(),
            "Replaying journal entry"
        );
        state.apply(&event);
        Ok(())
    }
}

// ───────────────────────── Durable Marketplace ─────────────────────────

/// The in-memory engine plus its operation log and snapshot store.
///
/// Write operations run the engine first; only a committed operation's
/// events reach the journal. If a journal append fails after the engine
/// committed, memory is ahead of disk, so the wrapper poisons itself:
/// reads keep serving, every further write returns
/// [`StorageError::Poisoned`], and a reopen recovers to the last
/// journaled state.
pub struct DurableMarketplace {
    market: Marketplace,
    writer: LogWriter,
    snapshots: SnapshotStore,
    config: StorageConfig,
    events_since_snapshot: u64,
    poisoned: bool,
}

impl DurableMarketplace {
    /// Recover (or initialize) a marketplace from `config.data_dir`.
    ///
    /// `admin` and `market_id` seed the very first open of a data
    /// directory; afterwards identity is restored from the journal.
    /// A journal whose tail is sequence-discontiguous fails to open:
    /// entries after a hole are unreachable by replay, and appending
    /// past them would fork the history.
    pub fn open(
        config: StorageConfig,
        admin: AccountId,
        market_id: AccountId,
    ) -> Result<Self, DurableError> {
        let snapshots = SnapshotStore::new(config.snapshot_dir(), config.compress_snapshots);
        let recovery = RecoveryEngine::new(snapshots.clone(), config.journal_dir());
        let outcome = recovery
            .recover::<MarketState, _>(&MarketReplayer)
            .map_err(StorageError::from)?;

        for skip in &outcome.snapshot_skips {
            warn!(
                path = %skip.path.display(),
                reason = %skip.reason,
                "Unusable snapshot skipped during recovery"
            );
        }
        for report in &outcome.corruption_reports {
            warn!(
                file = %report.file.display(),
                offset = report.offset,
                torn_tail = report.is_torn_tail(),
                "Corrupt journal frame; state reflects the prefix before it"
            );
        }

        let metrics = &outcome.metrics;
        info!(
            snapshot_sequence = ?metrics.snapshot_sequence,
            entries_replayed = metrics.entries_replayed,
            final_sequence = metrics.final_sequence,
            elapsed_ms = metrics.elapsed.as_millis() as u64,
            "Marketplace state recovered"
        );

        let mut log_config = LogConfig::new(config.journal_dir());
        log_config.max_file_bytes = config.max_journal_file_bytes;
        log_config.flush_policy = config.flush_policy;
        log_config.fsync_policy = config.fsync_policy;

        let mut writer = LogWriter::open(log_config).map_err(StorageError::from)?;
        writer
            .set_next_sequence(metrics.final_sequence + 1)
            .map_err(StorageError::from)?;

        let cold_start =
            metrics.snapshot_sequence.is_none() && metrics.final_sequence == 0;
        let market = if cold_start {
            Marketplace::new(admin, market_id)
        } else {
            let state = outcome.state;
            Marketplace::restore(state.admin, state.market_id, state.currencies, state.orders)
        };

        let mut durable = Self {
            market,
            writer,
            snapshots,
            config,
            events_since_snapshot: 0,
            poisoned: false,
        };

        if cold_start {
            let genesis = MarketEvent::MarketOpened(MarketOpened { admin, market_id });
            durable
                .journal_events(std::slice::from_ref(&genesis))
                .map_err(DurableError::from)?;
            info!(admin = %admin, market_id = %market_id, "Market opened");
        }

        Ok(durable)
    }

    // ───────────────────────── Write Operations ─────────────────────────

    pub fn add_currency(
        &mut self,
        caller: AccountId,
        currency: CurrencyId,
    ) -> Result<(), DurableError> {
        self.ensure_writable()?;
        self.market.add_currency(caller, currency)?;
        self.commit()
    }

    pub fn remove_currency(
        &mut self,
        caller: AccountId,
        currency: CurrencyId,
    ) -> Result<(), DurableError> {
        self.ensure_writable()?;
        self.market.remove_currency(caller, currency)?;
        self.commit()
    }

    pub fn transfer_admin(
        &mut self,
        caller: AccountId,
        new_admin: AccountId,
    ) -> Result<(), DurableError> {
        self.ensure_writable()?;
        self.market.transfer_admin(caller, new_admin)?;
        self.commit()
    }

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
    ) -> Result<Order, DurableError> {
        self.ensure_writable()?;
        let order = self.market.create_order(
            registry,
            caller,
            key,
            price,
            currency,
            expires_at,
            current_time,
        )?;
        self.commit()?;
        Ok(order)
    }

    pub fn buy(
        &mut self,
        registry: &mut impl AssetRegistry,
        ledger: &mut impl CurrencyLedger,
        caller: AccountId,
        key: AssetKey,
        price: Price,
        current_time: i64,
    ) -> Result<Order, DurableError> {
        self.ensure_writable()?;
        let order = self
            .market
            .buy(registry, ledger, caller, key, price, current_time)?;
        self.commit()?;
        Ok(order)
    }

    pub fn cancel_order(
        &mut self,
        caller: AccountId,
        key: AssetKey,
    ) -> Result<Order, DurableError> {
        self.ensure_writable()?;
        let order = self.market.cancel_order(caller, key)?;
        self.commit()?;
        Ok(order)
    }

    pub fn purge_expired(
        &mut self,
        caller: AccountId,
        current_time: i64,
    ) -> Result<Vec<Order>, DurableError> {
        self.ensure_writable()?;
        let purged = self.market.purge_expired(caller, current_time)?;
        self.commit()?;
        Ok(purged)
    }

    // ───────────────────────── Snapshots ─────────────────────────

    /// Write a snapshot now and prune journal files it fully covers.
    pub fn snapshot(&mut self) -> Result<PathBuf, DurableError> {
        self.ensure_writable()?;
        self.take_snapshot().map_err(DurableError::from)
    }

    /// Flush and fsync the journal.
    pub fn sync(&mut self) -> Result<(), DurableError> {
        self.writer.sync().map_err(StorageError::from)?;
        Ok(())
    }

    // ───────────────────────── Read Surface ─────────────────────────

    pub fn admin(&self) -> AccountId {
        self.market.admin()
    }

    pub fn market_id(&self) -> AccountId {
        self.market.market_id()
    }

    pub fn currencies(&self) -> &[CurrencyId] {
        self.market.currencies()
    }

    pub fn is_whitelisted(&self, currency: &CurrencyId) -> bool {
        self.market.is_whitelisted(currency)
    }

    pub fn order(&self, key: &AssetKey) -> Option<&Order> {
        self.market.order(key)
    }

    pub fn list_orders(&self) -> Vec<Order> {
        self.market.list_orders()
    }

    pub fn list_orders_by_seller(&self, seller: AccountId) -> Vec<Order> {
        self.market.list_orders_by_seller(seller)
    }

    pub fn order_count(&self) -> usize {
        self.market.order_count()
    }

    /// Sequence of the last journaled event; 0 before genesis.
    pub fn sequence(&self) -> u64 {
        self.writer.next_sequence() - 1
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    // ───────────────────────── Internals ─────────────────────────

    fn ensure_writable(&self) -> Result<(), StorageError> {
        if self.poisoned {
            return Err(StorageError::Poisoned);
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DurableError> {
        let events = self.market.drain_events();
        self.journal_events(&events).map_err(DurableError::from)
    }

    fn journal_events(&mut self, events: &[MarketEvent]) -> Result<(), StorageError> {
        if self.poisoned {
            return Err(StorageError::Poisoned);
        }

        for event in events {
            let payload = match bincode::serialize(event) {
                Ok(payload) => payload,
                Err(err) => {
                    self.poisoned = true;
                    error!(
                        event = event.label(),
                        error = %err,
                        "Event encoding failed; storage poisoned until reopen"
                    );
                    return Err(StorageError::Encode(err.to_string()));
                }
            };

            let timestamp = Utc::now().timestamp_millis();
            if let Err(err) = self.writer.append(&payload, timestamp) {
                self.poisoned = true;
                error!(
                    event = event.label(),
                    error = %err,
                    "Journal append failed; storage poisoned until reopen"
                );
                return Err(StorageError::Log(err));
            }
            self.events_since_snapshot += 1;
        }

        if self.config.snapshot_interval > 0
            && self.events_since_snapshot >= self.config.snapshot_interval
        {
            // A snapshot failure is not fatal here: the journal already
            // holds every event, so recovery can replay without it.
            if let Err(err) = self.take_snapshot() {
                error!(error = %err, "Automatic snapshot failed; journal remains authoritative");
            }
        }
        Ok(())
    }

    fn take_snapshot(&mut self) -> Result<PathBuf, StorageError> {
        let sequence = self.writer.next_sequence() - 1;
        let state = MarketState::capture(&self.market);
        let taken_at = Utc::now().timestamp_millis();

        let path = self.snapshots.write(&state, sequence, taken_at)?;
        self.events_since_snapshot = 0;
        info!(sequence, path = %path.display(), "State snapshot written");

        match self.snapshots.retain(self.config.snapshots_retained) {
            Ok(removed) => {
                for old in removed {
                    debug!(path = %old.display(), "Old snapshot removed");
                }
            }
            Err(err) => warn!(error = %err, "Snapshot retention sweep failed"),
        }
        self.cleanup_journals(sequence);

        Ok(path)
    }

    /// Remove journal files whose every entry is at or below
    /// `covered_sequence`. Best-effort; the current writer file is
    /// never touched.
    fn cleanup_journals(&self, covered_sequence: u64) {
        let reader = match LogReader::open(&self.config.journal_dir()) {
            Ok(reader) => reader,
            Err(err) => {
                warn!(error = %err, "Journal cleanup skipped: directory scan failed");
                return;
            }
        };

        for path in reader.files() {
            if path.as_path() == self.writer.current_path() {
                continue;
            }
            let covered = match LogReader::scan_file(path) {
                Ok(scan) => scan
                    .last_sequence
                    .map_or(true, |last| last <= covered_sequence),
                Err(err) => {
                    warn!(
                        file = %path.display(),
                        error = %err,
                        "Journal cleanup could not scan a file; keeping it"
                    );
                    false
                }
            };
            if covered {
                match fs::remove_file(path) {
                    Ok(()) => {
                        info!(file = %path.display(), "Removed journal file covered by snapshot")
                    }
                    Err(err) => {
                        warn!(file = %path.display(), error = %err, "Failed to remove journal file")
                    }
                }
            }
        }
    }
}
