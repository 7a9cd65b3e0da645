//! Datasets
//!
//! A [`Dataset`] bundles the customers, the candidate coupons and the acceptance
//! probabilities linking them. Everything downstream (baseline, solver, reports)
//! works from one.

use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    acceptance::{AcceptanceError, AcceptanceMatrix},
    coupons::CouponSet,
    customers::{Population, PopulationError},
};

pub mod synthetic;

/// Errors related to dataset validation.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Customers and coupons use different currencies.
    #[error("Population has currency {0}, but coupon set has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Acceptance matrix row count differs from the number of customers.
    #[error("acceptance matrix has {found} rows, expected one per customer ({expected})")]
    CustomerCount {
        /// Number of customers
        expected: usize,
        /// Number of matrix rows
        found: usize,
    },

    /// Acceptance matrix column count differs from the number of coupons.
    #[error("acceptance matrix has {found} columns, expected one per coupon ({expected})")]
    CouponCount {
        /// Number of coupons
        expected: usize,
        /// Number of matrix columns
        found: usize,
    },

    /// Wrapped acceptance error.
    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    /// Wrapped population error.
    #[error(transparent)]
    Population(#[from] PopulationError),
}

/// Customers, coupons and acceptance probabilities for one assignment problem.
#[derive(Debug, Clone)]
pub struct Dataset {
    population: Population,
    coupons: CouponSet,
    acceptance: AcceptanceMatrix,
}

impl Dataset {
    /// Create a dataset, validating that all three parts line up.
    ///
    /// # Errors
    ///
    /// Returns a [`DatasetError`] if currencies differ or the acceptance matrix
    /// shape does not match the customers and coupons.
    pub fn new(
        population: Population,
        coupons: CouponSet,
        acceptance: AcceptanceMatrix,
    ) -> Result<Self, DatasetError> {
        if population.currency() != coupons.currency() {
            return Err(DatasetError::CurrencyMismatch(
                population.currency().iso_alpha_code,
                coupons.currency().iso_alpha_code,
            ));
        }

        if acceptance.customer_count() != population.len() {
            return Err(DatasetError::CustomerCount {
                expected: population.len(),
                found: acceptance.customer_count(),
            });
        }

        if acceptance.coupon_count() != coupons.len() {
            return Err(DatasetError::CouponCount {
                expected: coupons.len(),
                found: acceptance.coupon_count(),
            });
        }

        Ok(Dataset {
            population,
            coupons,
            acceptance,
        })
    }

    /// Keep only the first `n` customers.
    ///
    /// # Errors
    ///
    /// Returns a [`DatasetError`] if the truncated parts fail validation.
    pub fn truncate(self, n: usize) -> Result<Self, DatasetError> {
        if n >= self.population.len() {
            return Ok(self);
        }

        let currency = self.population.currency();
        let customers: Vec<_> = self.population.iter().take(n).cloned().collect();
        let rows: Vec<_> = self.acceptance.rows().take(n).map(<[_]>::to_vec).collect();

        let population = Population::with_customers(customers, currency)?;
        let acceptance = AcceptanceMatrix::new(rows, self.coupons.len())?;

        Self::new(population, self.coupons, acceptance)
    }

    /// The customers.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// The candidate coupons.
    pub fn coupons(&self) -> &CouponSet {
        &self.coupons
    }

    /// The acceptance probabilities.
    pub fn acceptance(&self) -> &AcceptanceMatrix {
        &self.acceptance
    }

    /// Currency shared by customers and coupons.
    pub fn currency(&self) -> &'static Currency {
        self.population.currency()
    }
}
