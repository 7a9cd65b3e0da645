//! Synthetic Datasets
//!
//! Generates random customers and acceptance probabilities. Probability and CLTV
//! estimation are out of scope, so both are drawn from simple uniform distributions.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;
use tracing::debug;

use crate::{
    acceptance::{AcceptanceError, AcceptanceMatrix, Probability},
    coupons::CouponSet,
    customers::{Customer, Population, PopulationError},
    dataset::{Dataset, DatasetError},
};

/// Decimal places kept on generated probabilities.
const PROBABILITY_DP: u32 = 4;

/// Errors raised while generating a synthetic dataset.
#[derive(Debug, Error)]
pub enum SyntheticError {
    /// No customers requested.
    #[error("at least one customer is required")]
    NoCustomers,

    /// The CLTV range is inverted (min, max in minor units).
    #[error("CLTV minimum {0} is greater than maximum {1}")]
    InvalidCltvRange(i64, i64),

    /// The CLTV range includes negative values.
    #[error("CLTV range must not be negative")]
    NegativeCltv,

    /// CLTV bounds use a different currency from the coupons.
    #[error("CLTV range has currency {0}, but coupon set has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped acceptance error.
    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    /// Wrapped population error.
    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Wrapped dataset error.
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Parameters for a synthetic dataset.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Number of customers to generate
    pub customers: usize,

    /// Lowest possible customer lifetime value
    pub cltv_min: Money<'static, Currency>,

    /// Highest possible customer lifetime value
    pub cltv_max: Money<'static, Currency>,

    /// Candidate coupons
    pub coupons: CouponSet,

    /// Random seed; the same seed always produces the same dataset
    pub seed: u64,
}

/// Generate a dataset from the given configuration.
///
/// Each customer's CLTV is drawn uniformly from `[cltv_min, cltv_max]`. Their
/// acceptance probabilities are independent uniform draws, sorted so that a larger
/// coupon is never less likely to be accepted than a smaller one.
///
/// # Errors
///
/// Returns a [`SyntheticError`] if the configuration is invalid.
pub fn generate(config: &SyntheticConfig) -> Result<Dataset, SyntheticError> {
    validate(config)?;

    let currency = config.coupons.currency();
    let min = config.cltv_min.to_minor_units();
    let max = config.cltv_max.to_minor_units();
    let coupon_count = config.coupons.len();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut customers = Vec::with_capacity(config.customers);
    let mut rows = Vec::with_capacity(config.customers);

    for idx in 0..config.customers {
        let cltv = rng.gen_range(min..=max);

        customers.push(Customer::new(
            customer_name(idx),
            Money::from_minor(cltv, currency),
        ));

        rows.push(acceptance_row(&mut rng, coupon_count)?);
    }

    debug!(
        customers = config.customers,
        coupons = coupon_count,
        seed = config.seed,
        "generated synthetic dataset"
    );

    let population = Population::with_customers(customers, currency)?;
    let acceptance = AcceptanceMatrix::new(rows, coupon_count)?;

    Ok(Dataset::new(
        population,
        config.coupons.clone(),
        acceptance,
    )?)
}

fn validate(config: &SyntheticConfig) -> Result<(), SyntheticError> {
    if config.customers == 0 {
        return Err(SyntheticError::NoCustomers);
    }

    let currency = config.coupons.currency();

    for bound in [config.cltv_min, config.cltv_max] {
        if bound.currency() != currency {
            return Err(SyntheticError::CurrencyMismatch(
                bound.currency().iso_alpha_code,
                currency.iso_alpha_code,
            ));
        }
    }

    let min = config.cltv_min.to_minor_units();
    let max = config.cltv_max.to_minor_units();

    if min > max {
        return Err(SyntheticError::InvalidCltvRange(min, max));
    }

    if min < 0 {
        return Err(SyntheticError::NegativeCltv);
    }

    Ok(())
}

/// Sorted uniform draws, one per coupon, in ascending face value order.
fn acceptance_row(
    rng: &mut StdRng,
    coupon_count: usize,
) -> Result<Vec<Probability>, SyntheticError> {
    let mut draws: Vec<Decimal> = (0..coupon_count)
        .map(|_| {
            let draw: f64 = rng.gen_range(0.0..1.0);

            Decimal::from_f64(draw)
                .unwrap_or(Decimal::ZERO)
                .round_dp_with_strategy(PROBABILITY_DP, RoundingStrategy::MidpointAwayFromZero)
        })
        .collect();

    draws.sort_unstable();

    Ok(draws
        .into_iter()
        .map(Probability::new)
        .collect::<Result<Vec<_>, _>>()?)
}

fn customer_name(idx: usize) -> String {
    format!("customer-{:04}", idx + 1)
}
