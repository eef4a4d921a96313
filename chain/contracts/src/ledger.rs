//! Currency ledger — balances and transfer-from-allowance
//!
//! The marketplace's view of external fungible-currency contracts:
//! - `CurrencyLedger` trait: balance/allowance queries and the
//!   allowance-backed transfer the settlement engine draws payment with
//! - `TokenLedger`: a reference in-memory implementation covering any
//!   number of currencies
//!
//! Balances are stored as `HashMap<AccountId, HashMap<CurrencyId, Decimal>>`;
//! allowances are keyed by (currency, owner, spender).

use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::{AccountId, CurrencyId};

use crate::errors::LedgerError;

/// External currency-ledger interface.
///
/// `transfer_from` draws on an allowance the payer granted to `spender`
/// beforehand; the marketplace passes its own identity as the spender.
/// Zero-amount transfers succeed without touching any balance, so
/// zero-priced listings settle cleanly.
pub trait CurrencyLedger {
    /// Current balance of `account` in `currency`
    fn balance_of(&self, currency: &CurrencyId, account: &AccountId) -> Decimal;

    /// Remaining allowance `owner` has granted `spender` in `currency`
    fn allowance(&self, currency: &CurrencyId, owner: &AccountId, spender: &AccountId)
        -> Decimal;

    /// Move `amount` from `payer` to `payee`, consuming the payer's
    /// allowance to `spender`. Fails `InsufficientAllowance` or
    /// `InsufficientFunds` without any state change.
    fn transfer_from(
        &mut self,
        currency: &CurrencyId,
        payer: &AccountId,
        payee: &AccountId,
        amount: Decimal,
        spender: &AccountId,
    ) -> Result<(), LedgerError>;
}

/// Reference in-memory currency ledger.
#[derive(Debug, Default)]
pub struct TokenLedger {
    /// Balances: account -> (currency -> amount)
    balances: HashMap<AccountId, HashMap<CurrencyId, Decimal>>,
    /// Allowances: (currency, owner, spender) -> amount
    allowances: HashMap<(CurrencyId, AccountId, AccountId), Decimal>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────── Supply ─────────────────────────

    /// Credit freshly issued units to an account. Amount must be positive.
    pub fn mint(
        &mut self,
        currency: &CurrencyId,
        account: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let balance = self
            .balances
            .entry(account)
            .or_default()
            .entry(currency.clone())
            .or_insert(Decimal::ZERO);
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    // ───────────────────────── Allowances ─────────────────────────

    /// Set (not increment) the allowance `owner` grants `spender`.
    /// A zero amount clears the grant.
    pub fn approve(
        &mut self,
        currency: &CurrencyId,
        owner: &AccountId,
        spender: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        let slot = (currency.clone(), *owner, spender);
        if amount.is_zero() {
            self.allowances.remove(&slot);
        } else {
            self.allowances.insert(slot, amount);
        }
        Ok(())
    }
}

impl CurrencyLedger for TokenLedger {
    fn balance_of(&self, currency: &CurrencyId, account: &AccountId) -> Decimal {
        self.balances
            .get(account)
            .and_then(|currencies| currencies.get(currency))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn allowance(
        &self,
        currency: &CurrencyId,
        owner: &AccountId,
        spender: &AccountId,
    ) -> Decimal {
        self.allowances
            .get(&(currency.clone(), *owner, *spender))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn transfer_from(
        &mut self,
        currency: &CurrencyId,
        payer: &AccountId,
        payee: &AccountId,
        amount: Decimal,
        spender: &AccountId,
    ) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if amount.is_zero() {
            return Ok(());
        }

        // Validate everything before the first write so a failure
        // leaves no partial state.
        let granted = self.allowance(currency, payer, spender);
        if granted < amount {
            return Err(LedgerError::InsufficientAllowance {
                required: amount,
                available: granted,
            });
        }

        let payer_balance = self.balance_of(currency, payer);
        if payer_balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: payer_balance,
            });
        }

        self.balance_of(currency, payee)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        // Commit: consume allowance, debit payer, credit payee. Payee is
        // re-read after the debit so payer == payee nets to no change.
        let remaining = granted - amount;
        let slot = (currency.clone(), *payer, *spender);
        if remaining.is_zero() {
            self.allowances.remove(&slot);
        } else {
            self.allowances.insert(slot, remaining);
        }

        let debited = self
            .balances
            .entry(*payer)
            .or_default()
            .entry(currency.clone())
            .or_insert(Decimal::ZERO);
        *debited -= amount;

        let credited = self
            .balances
            .entry(*payee)
            .or_default()
            .entry(currency.clone())
            .or_insert(Decimal::ZERO);
        *credited += amount;

        Ok(())
    }
}
