//! Business As Usual Baseline
//!
//! Offers every customer a coupon worth a fixed share of their lifetime value,
//! snapped to the nearest candidate coupon that still has issuance capacity.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::{
    assignments::{AssignmentError, AssignmentPlan},
    dataset::Dataset,
    returns::{ReturnsError, percent_of_minor},
};

/// Errors raised while applying the baseline policy.
#[derive(Debug, Error)]
pub enum BaselineError {
    /// Wrapped expected value error.
    #[error(transparent)]
    Returns(#[from] ReturnsError),

    /// Wrapped assignment error.
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    /// Every coupon hit its issuance limit before this customer (index) was served.
    #[error("No coupon has capacity left for customer {0}")]
    CapacityExhausted(usize),
}

/// Heuristic policy: coupon = `rate` x CLTV.
#[derive(Debug, Clone, Copy)]
pub struct BaselinePolicy {
    /// Share of lifetime value offered as a coupon
    pub rate: Percentage,
}

impl Default for BaselinePolicy {
    fn default() -> Self {
        BaselinePolicy {
            rate: Percentage::from(Decimal::new(10, 2)),
        }
    }
}

impl BaselinePolicy {
    /// Create a baseline policy with the given rate.
    pub fn new(rate: Percentage) -> Self {
        BaselinePolicy { rate }
    }

    /// Target coupon value (minor units) for a customer lifetime value.
    ///
    /// # Errors
    ///
    /// Returns [`ReturnsError::Overflow`] if the calculation overflows.
    pub fn target_minor(&self, cltv_minor: i64) -> Result<i64, ReturnsError> {
        percent_of_minor(&self.rate, cltv_minor)
    }

    /// Assign each customer the candidate coupon nearest to their target value.
    ///
    /// Customers are served in population order. Once a coupon reaches its limit the
    /// next-nearest coupon with capacity is used instead.
    ///
    /// # Errors
    ///
    /// Returns a [`BaselineError`] if a target or expected value cannot be computed, or
    /// if the coupon limits run out before every customer is served.
    pub fn assign(&self, dataset: &Dataset) -> Result<AssignmentPlan, BaselineError> {
        let mut remaining: Vec<Option<u32>> =
            dataset.coupons().iter().map(|coupon| coupon.limit).collect();

        let mut choices = Vec::with_capacity(dataset.population().len());

        for (customer_idx, customer) in dataset.population().iter().enumerate() {
            let target = self.target_minor(customer.cltv.to_minor_units())?;

            let coupon_idx = dataset
                .coupons()
                .nearest_where(target, |idx| {
                    remaining.get(idx).copied().is_some_and(|left| left.is_none_or(|n| n > 0))
                })
                .ok_or(BaselineError::CapacityExhausted(customer_idx))?;

            if let Some(Some(left)) = remaining.get_mut(coupon_idx) {
                *left = left.saturating_sub(1);
            }

            choices.push(coupon_idx);
        }

        let plan = AssignmentPlan::from_choices(dataset, &choices)?;

        debug!(
            customers = plan.len(),
            expected_return = %plan.expected_return(),
            "applied baseline policy"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::USD};
    use testresult::TestResult;

    use crate::{
        acceptance::{AcceptanceMatrix, Probability},
        coupons::{Coupon, CouponSet},
        customers::{Customer, Population},
    };

    use super::*;

    fn dataset() -> Result<Dataset, Box<dyn std::error::Error>> {
        let population = Population::with_customers(
            [
                Customer::new("low", Money::from_minor(2_000, USD)),
                Customer::new("mid", Money::from_minor(10_000, USD)),
                Customer::new("high", Money::from_minor(100_000, USD)),
            ],
            USD,
        )?;

        let coupons = CouponSet::from_minor_units(&[0, 1_000, 5_000], USD)?;
        let acceptance = AcceptanceMatrix::new(vec![vec![Probability::ONE; 3]; 3], 3)?;

        Ok(Dataset::new(population, coupons, acceptance)?)
    }

    #[test]
    fn default_rate_is_ten_percent() -> TestResult {
        let policy = BaselinePolicy::default();

        assert_eq!(policy.target_minor(12_340)?, 1_234);

        Ok(())
    }

    #[test]
    fn assign_snaps_to_nearest_coupon() -> TestResult {
        let dataset = dataset()?;

        let plan = BaselinePolicy::default().assign(&dataset)?;

        // targets: 200 -> 0, 1000 -> 1000, 10000 -> 5000
        assert_eq!(plan.choices(), vec![0, 1, 2]);
        assert_eq!(plan.issued_face_value()?.to_minor_units(), 6_000);

        Ok(())
    }

    #[test]
    fn assign_respects_coupon_limits() -> TestResult {
        let population = Population::with_customers(
            [
                Customer::new("a", Money::from_minor(10_000, USD)),
                Customer::new("b", Money::from_minor(11_000, USD)),
                Customer::new("c", Money::from_minor(6_000, USD)),
                Customer::new("d", Money::from_minor(1_000, USD)),
            ],
            USD,
        )?;

        let coupons = CouponSet::new(
            [
                Coupon::new(Money::from_minor(0, USD)),
                Coupon::with_limit(Money::from_minor(1_000, USD), 1),
                Coupon::new(Money::from_minor(1_500, USD)),
            ],
            USD,
        )?;
        let acceptance = AcceptanceMatrix::new(vec![vec![Probability::ONE; 3]; 4], 3)?;
        let dataset = Dataset::new(population, coupons, acceptance)?;

        let plan = BaselinePolicy::default().assign(&dataset)?;

        // targets: 1000, 1100, 600, 100; only "a" gets the capped 1000 coupon
        assert_eq!(plan.choices(), vec![1, 2, 0, 0]);
        assert_eq!(plan.coupon_histogram().get(&1).copied(), Some(1));

        Ok(())
    }

    #[test]
    fn assign_fails_when_limits_run_out() -> TestResult {
        let population = Population::with_customers(
            [
                Customer::new("a", Money::from_minor(10_000, USD)),
                Customer::new("b", Money::from_minor(10_000, USD)),
            ],
            USD,
        )?;

        let coupons = CouponSet::new([Coupon::with_limit(Money::from_minor(1_000, USD), 1)], USD)?;
        let acceptance = AcceptanceMatrix::new(vec![vec![Probability::ONE]; 2], 1)?;
        let dataset = Dataset::new(population, coupons, acceptance)?;

        let result = BaselinePolicy::default().assign(&dataset);

        assert!(matches!(result, Err(BaselineError::CapacityExhausted(1))));

        Ok(())
    }

    #[test]
    fn assign_with_custom_rate() -> TestResult {
        let dataset = dataset()?;

        let plan = BaselinePolicy::new(Percentage::try_from("0.5")?).assign(&dataset)?;

        // targets: 1000 -> 1000, 5000 -> 5000, 50000 -> 5000
        assert_eq!(plan.choices(), vec![1, 2, 2]);

        Ok(())
    }
}
