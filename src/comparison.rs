//! Policy Comparison

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::assignments::AssignmentPlan;

/// Errors that can occur while comparing two plans.
#[derive(Debug, Error)]
pub enum ComparisonError {
    /// The two plans are priced in different currencies.
    #[error("baseline plan has currency {0}, but optimised plan has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Aggregate outcome of a single policy.
#[derive(Debug, Clone, Copy)]
pub struct PolicySummary {
    /// Total expected net return in minor units
    pub expected_return: Decimal,

    /// Sum of issued coupon face values
    pub issued: Money<'static, Currency>,

    /// Total expected redemption cost in minor units
    pub expected_cost: Decimal,
}

impl PolicySummary {
    /// Summarise a plan.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the issued face values cannot be summed.
    pub fn from_plan(plan: &AssignmentPlan) -> Result<Self, MoneyError> {
        Ok(PolicySummary {
            expected_return: plan.expected_return(),
            issued: plan.issued_face_value()?,
            expected_cost: plan.expected_cost(),
        })
    }

    /// Expected return per unit of issued face value, `None` when nothing is issued.
    pub fn roi(&self) -> Option<Decimal> {
        let issued = Decimal::from(self.issued.to_minor_units());

        if issued.is_zero() {
            return None;
        }

        self.expected_return.checked_div(issued)
    }
}

/// Side-by-side outcome of the baseline and optimised policies.
#[derive(Debug, Clone, Copy)]
pub struct Comparison {
    /// Business-as-usual policy
    pub baseline: PolicySummary,

    /// Optimised policy
    pub optimised: PolicySummary,
}

impl Comparison {
    /// Compare two plans over the same dataset.
    ///
    /// # Errors
    ///
    /// Returns a [`ComparisonError`] if the plans use different currencies.
    pub fn new(
        baseline: &AssignmentPlan,
        optimised: &AssignmentPlan,
    ) -> Result<Self, ComparisonError> {
        if baseline.currency() != optimised.currency() {
            return Err(ComparisonError::CurrencyMismatch(
                baseline.currency().iso_alpha_code,
                optimised.currency().iso_alpha_code,
            ));
        }

        Ok(Comparison {
            baseline: PolicySummary::from_plan(baseline)?,
            optimised: PolicySummary::from_plan(optimised)?,
        })
    }

    /// Absolute uplift in expected return, in minor units.
    pub fn uplift(&self) -> Decimal {
        self.optimised.expected_return - self.baseline.expected_return
    }

    /// Uplift relative to the baseline; zero when the baseline return is zero.
    pub fn relative_uplift(&self) -> Percentage {
        let ratio = self
            .uplift()
            .checked_div(self.baseline.expected_return)
            .unwrap_or(Decimal::ZERO);

        Percentage::from(ratio)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        acceptance::{AcceptanceMatrix, Probability},
        coupons::CouponSet,
        customers::{Customer, Population},
        dataset::Dataset,
    };

    use super::*;

    fn dataset() -> Result<Dataset, Box<dyn std::error::Error>> {
        let population = Population::with_customers(
            [
                Customer::new("a", Money::from_minor(10_000, USD)),
                Customer::new("b", Money::from_minor(20_000, USD)),
            ],
            USD,
        )?;
        let coupons = CouponSet::from_minor_units(&[0, 1_000], USD)?;
        let acceptance = AcceptanceMatrix::new(
            vec![
                vec![Probability::new(Decimal::new(2, 1))?, Probability::new(Decimal::new(5, 1))?],
                vec![Probability::new(Decimal::new(4, 1))?, Probability::new(Decimal::new(5, 1))?],
            ],
            2,
        )?;

        Ok(Dataset::new(population, coupons, acceptance)?)
    }

    #[test]
    fn computes_uplift_between_policies() -> TestResult {
        let dataset = dataset()?;

        // Baseline: a 2000, b 8000 = 10000
        let baseline = AssignmentPlan::from_choices(&dataset, &[0, 0])?;

        // Optimised: a 4500, b 9500 = 14000
        let optimised = AssignmentPlan::from_choices(&dataset, &[1, 1])?;

        let comparison = Comparison::new(&baseline, &optimised)?;

        assert_eq!(comparison.baseline.expected_return, Decimal::from(10_000));
        assert_eq!(comparison.optimised.expected_return, Decimal::from(14_000));
        assert_eq!(comparison.uplift(), Decimal::from(4_000));
        assert_eq!(
            comparison.relative_uplift(),
            Percentage::from(Decimal::new(4, 1))
        );
        assert_eq!(comparison.optimised.issued.to_minor_units(), 2_000);
        assert_eq!(comparison.optimised.expected_cost, Decimal::from(1_000));

        Ok(())
    }

    #[test]
    fn roi_is_none_when_nothing_issued() -> TestResult {
        let dataset = dataset()?;
        let plan = AssignmentPlan::from_choices(&dataset, &[0, 0])?;

        let summary = PolicySummary::from_plan(&plan)?;

        assert_eq!(summary.roi(), None);

        Ok(())
    }

    #[test]
    fn roi_divides_return_by_issued_value() -> TestResult {
        let dataset = dataset()?;
        let plan = AssignmentPlan::from_choices(&dataset, &[1, 1])?;

        let summary = PolicySummary::from_plan(&plan)?;

        assert_eq!(summary.roi(), Some(Decimal::from(7)));

        Ok(())
    }

    #[test]
    fn relative_uplift_is_zero_for_zero_baseline() -> TestResult {
        let dataset = Dataset::new(
            Population::with_customers([Customer::new("a", Money::from_minor(0, USD))], USD)?,
            CouponSet::from_minor_units(&[0], USD)?,
            AcceptanceMatrix::new(vec![vec![Probability::ONE]], 1)?,
        )?;
        let plan = AssignmentPlan::from_choices(&dataset, &[0])?;

        let comparison = Comparison::new(&plan, &plan)?;

        assert_eq!(comparison.relative_uplift(), Percentage::from(Decimal::ZERO));

        Ok(())
    }
}
