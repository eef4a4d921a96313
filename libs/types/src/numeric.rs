//! Monetary amounts
//!
//! Prices are exact decimals, never floats. A listing price is a whole
//! number of the payment currency's smallest unit, so the constructor
//! rejects negative and fractional values. Zero is a valid price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative, integral amount in smallest currency units
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Validate an arbitrary decimal as a price
    ///
    /// Returns `None` for negative or fractional values. The stored
    /// decimal is normalized so `100` and `100.00` compare and hash
    /// identically.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value < Decimal::ZERO || !value.fract().is_zero() {
            return None;
        }
        Some(Self(value.normalize()))
    }

    /// Price from a whole number of smallest units
    pub fn from_units(units: u64) -> Self {
        Self(Decimal::from(units))
    }

    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the inner decimal amount
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
