//! Cart line quantities.
//!
//! A persisted cart item always has a quantity of at least one; removing the
//! last unit deletes the row instead of storing zero.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// The requested quantity was zero or negative.
    #[error("quantity must be at least 1 (got {0})")]
    TooSmall(i64),
    /// The quantity does not fit the database column.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A validated quantity (`>= 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    /// Smallest valid quantity.
    pub const ONE: Self = Self(1);

    /// Validate a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooSmall` for values below 1 and
    /// `QuantityError::TooLarge` for values outside the `i32` range.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::TooSmall(value));
        }
        i32::try_from(value)
            .map(Self)
            .map_err(|_| QuantityError::TooLarge(value))
    }

    /// The raw quantity.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Add two quantities, failing on overflow.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` if the sum overflows `i32`.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| QuantityError::TooLarge(i64::from(self.0) + i64::from(other.0)))
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero_and_negative() {
        assert_eq!(Quantity::new(0), Err(QuantityError::TooSmall(0)));
        assert_eq!(Quantity::new(-4), Err(QuantityError::TooSmall(-4)));
    }

    #[test]
    fn test_quantity_rejects_overflow() {
        let too_big = i64::from(i32::MAX) + 1;
        assert_eq!(Quantity::new(too_big), Err(QuantityError::TooLarge(too_big)));
    }

    #[test]
    fn test_checked_add() {
        let sum = Quantity::new(2).unwrap().checked_add(Quantity::new(3).unwrap());
        assert_eq!(sum.unwrap().get(), 5);

        let max = Quantity::new(i64::from(i32::MAX)).unwrap();
        assert!(max.checked_add(Quantity::ONE).is_err());
    }

    #[test]
    fn test_quantity_deserialize() {
        let q: Quantity = serde_json::from_str("3").unwrap();
        assert_eq!(q.get(), 3);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
