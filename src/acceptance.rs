//! Acceptance Probabilities

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use thiserror::Error;

/// Errors related to acceptance probabilities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcceptanceError {
    /// Probability outside `[0, 1]` or not a finite number.
    #[error("probability must be a finite value between 0 and 1, got {0}")]
    OutOfRange(String),

    /// A row has the wrong number of coupon columns.
    #[error("acceptance row {row} has {found} columns, expected {expected}")]
    RowLength {
        /// Customer row index
        row: usize,
        /// Number of coupons
        expected: usize,
        /// Number of columns in the row
        found: usize,
    },

    /// Lookup outside the matrix.
    #[error("no acceptance probability for customer {customer_idx}, coupon {coupon_idx}")]
    OutOfBounds {
        /// Customer index
        customer_idx: usize,
        /// Coupon index
        coupon_idx: usize,
    },
}

/// Probability that a customer accepts a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Probability(Decimal);

impl Probability {
    /// Probability of zero.
    pub const ZERO: Probability = Probability(Decimal::ZERO);

    /// Probability of one.
    pub const ONE: Probability = Probability(Decimal::ONE);

    /// Create a probability from a decimal fraction.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError::OutOfRange`] if the value is outside `[0, 1]`.
    pub fn new(value: Decimal) -> Result<Self, AcceptanceError> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(AcceptanceError::OutOfRange(value.to_string()));
        }

        Ok(Probability(value))
    }

    /// Create a probability from a float.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError::OutOfRange`] if the value is not finite or is
    /// outside `[0, 1]`.
    pub fn from_f64(value: f64) -> Result<Self, AcceptanceError> {
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| AcceptanceError::OutOfRange(value.to_string()))?;

        Self::new(decimal)
    }

    /// Create a probability from a percentage (e.g. 35% is 0.35).
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError::OutOfRange`] if the percentage is above 100% or negative.
    pub fn from_percentage(percentage: Percentage) -> Result<Self, AcceptanceError> {
        // decimal_percentage doesn't expose the inner Decimal
        Self::new(percentage * Decimal::ONE)
    }

    /// The underlying decimal fraction.
    pub fn value(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Acceptance probabilities, one row per customer and one column per coupon.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceMatrix {
    rows: Vec<Vec<Probability>>,
    coupon_count: usize,
}

impl AcceptanceMatrix {
    /// Create a matrix, checking that every row has `coupon_count` columns.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError::RowLength`] for the first ragged row.
    pub fn new(rows: Vec<Vec<Probability>>, coupon_count: usize) -> Result<Self, AcceptanceError> {
        if let Some((row, found)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, len)| *len != coupon_count)
        {
            return Err(AcceptanceError::RowLength {
                row,
                expected: coupon_count,
                found,
            });
        }

        Ok(AcceptanceMatrix { rows, coupon_count })
    }

    /// Probability that `customer_idx` accepts `coupon_idx`.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptanceError::OutOfBounds`] if either index is out of range.
    pub fn get(
        &self,
        customer_idx: usize,
        coupon_idx: usize,
    ) -> Result<Probability, AcceptanceError> {
        self.rows
            .get(customer_idx)
            .and_then(|row| row.get(coupon_idx))
            .copied()
            .ok_or(AcceptanceError::OutOfBounds {
                customer_idx,
                coupon_idx,
            })
    }

    /// Iterate over the customer rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Probability]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Number of customer rows.
    pub fn customer_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of coupon columns.
    pub fn coupon_count(&self) -> usize {
        self.coupon_count
    }
}
