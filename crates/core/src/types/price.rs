//! Type-safe product price using decimal arithmetic.
//!
//! Catalog prices are stored as `NUMERIC(10, 2)` and must never be negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The amount was below zero.
    #[error("price must not be negative (got {0})")]
    Negative(Decimal),
}

/// A non-negative catalog price.
///
/// Serializes as a decimal string (e.g. `"4.99"`) so clients never see
/// floating point rounding artefacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount < 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// The zero price.
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rejects_negative() {
        let err = Price::new(Decimal::new(-1, 2)).unwrap_err();
        assert!(matches!(err, PriceError::Negative(_)));
    }

    #[test]
    fn test_price_accepts_zero() {
        assert_eq!(Price::new(Decimal::ZERO).unwrap(), Price::zero());
    }

    #[test]
    fn test_price_display_two_decimals() {
        let price = Price::new(Decimal::new(45, 1)).unwrap();
        assert_eq!(price.to_string(), "4.50");
    }

    #[test]
    fn test_price_deserialize_validates() {
        let ok: Price = serde_json::from_str("\"2.25\"").unwrap();
        assert_eq!(ok.amount(), Decimal::new(225, 2));

        let bad: Result<Price, _> = serde_json::from_str("\"-3.00\"");
        assert!(bad.is_err());
    }
}
