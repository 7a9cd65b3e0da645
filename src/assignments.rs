//! Assignments
//!
//! An [`AssignmentPlan`] gives every customer exactly one coupon and carries the
//! expected value of that choice. Both the baseline heuristic and the solver produce
//! plans, which is what makes them directly comparable.

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

use crate::{
    acceptance::{AcceptanceError, Probability},
    coupons::CouponError,
    customers::PopulationError,
    dataset::Dataset,
    returns::{ReturnsError, expected_cost, expected_return},
};

/// Errors raised while building an assignment plan.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// The number of choices differs from the number of customers.
    #[error("expected one coupon choice per customer ({expected}), got {found}")]
    ChoiceCount {
        /// Number of customers
        expected: usize,
        /// Number of choices
        found: usize,
    },

    /// Wrapped coupon lookup error.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Wrapped customer lookup error.
    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Wrapped acceptance lookup error.
    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    /// Wrapped expected value error.
    #[error(transparent)]
    Returns(#[from] ReturnsError),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// A single customer's coupon.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Index of the customer in the population
    pub customer_idx: usize,

    /// Index of the coupon in the coupon set
    pub coupon_idx: usize,

    /// Face value of the issued coupon
    pub face_value: Money<'static, Currency>,

    /// Probability the customer accepts the coupon
    pub probability: Probability,

    /// Expected net return in minor units
    pub expected_return: Decimal,

    /// Expected redemption cost in minor units
    pub expected_cost: Decimal,
}

/// One coupon per customer, with aggregates.
#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    assignments: Vec<Assignment>,
    coupon_count: usize,
    currency: &'static Currency,
}

impl AssignmentPlan {
    /// Evaluate a choice vector: `choices[i]` is the coupon index issued to customer `i`.
    ///
    /// # Errors
    ///
    /// Returns an [`AssignmentError`] if the vector length is wrong, a coupon index is
    /// out of range, or an expected value cannot be computed.
    pub fn from_choices(dataset: &Dataset, choices: &[usize]) -> Result<Self, AssignmentError> {
        let population = dataset.population();

        if choices.len() != population.len() {
            return Err(AssignmentError::ChoiceCount {
                expected: population.len(),
                found: choices.len(),
            });
        }

        let assignments = choices
            .iter()
            .copied()
            .enumerate()
            .map(|(customer_idx, coupon_idx)| {
                let customer = population.get_customer(customer_idx)?;
                let coupon = dataset.coupons().get(coupon_idx)?;
                let probability = dataset.acceptance().get(customer_idx, coupon_idx)?;

                Ok(Assignment {
                    customer_idx,
                    coupon_idx,
                    face_value: coupon.face_value,
                    probability,
                    expected_return: expected_return(
                        probability,
                        customer.cltv,
                        coupon.face_value,
                    )?,
                    expected_cost: expected_cost(probability, coupon.face_value)?,
                })
            })
            .collect::<Result<Vec<_>, AssignmentError>>()?;

        Ok(AssignmentPlan {
            assignments,
            coupon_count: dataset.coupons().len(),
            currency: dataset.currency(),
        })
    }

    /// An empty plan for an empty population.
    #[must_use]
    pub fn empty(dataset: &Dataset) -> Self {
        AssignmentPlan {
            assignments: Vec::new(),
            coupon_count: dataset.coupons().len(),
            currency: dataset.currency(),
        }
    }

    /// Sum of issued coupon face values.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the addition fails.
    pub fn issued_face_value(&self) -> Result<Money<'static, Currency>, MoneyError> {
        self.assignments
            .iter()
            .try_fold(Money::from_minor(0, self.currency), |acc, assignment| {
                acc.add(assignment.face_value)
            })
    }

    /// Total expected net return in minor units.
    pub fn expected_return(&self) -> Decimal {
        self.assignments
            .iter()
            .map(|assignment| assignment.expected_return)
            .sum()
    }

    /// Total expected redemption cost in minor units.
    pub fn expected_cost(&self) -> Decimal {
        self.assignments
            .iter()
            .map(|assignment| assignment.expected_cost)
            .sum()
    }

    /// Number of customers receiving each coupon, keyed by coupon index.
    ///
    /// Every coupon index is present, including those nobody received.
    pub fn coupon_histogram(&self) -> FxHashMap<usize, usize> {
        let mut histogram: FxHashMap<usize, usize> =
            (0..self.coupon_count).map(|idx| (idx, 0)).collect();

        for assignment in &self.assignments {
            *histogram.entry(assignment.coupon_idx).or_insert(0) += 1;
        }

        histogram
    }

    /// Coupon index chosen for each customer, in population order.
    pub fn choices(&self) -> Vec<usize> {
        self.assignments
            .iter()
            .map(|assignment| assignment.coupon_idx)
            .collect()
    }

    /// Iterate over the assignments in population order.
    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter()
    }

    /// Number of assignments.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Currency of all monetary values.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        acceptance::AcceptanceMatrix,
        coupons::CouponSet,
        customers::{Customer, Population},
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
                vec![Probability::new(Decimal::new(1, 1))?, Probability::new(Decimal::new(4, 1))?],
            ],
            2,
        )?;

        Ok(Dataset::new(population, coupons, acceptance)?)
    }

    #[test]
    fn from_choices_evaluates_expected_values() -> TestResult {
        let dataset = dataset()?;

        let plan = AssignmentPlan::from_choices(&dataset, &[1, 0])?;

        // a: 0.5 * (10000 - 1000) = 4500, b: 0.1 * 20000 = 2000
        assert_eq!(plan.expected_return(), Decimal::from(6_500));
        assert_eq!(plan.expected_cost(), Decimal::from(500));
        assert_eq!(plan.issued_face_value()?.to_minor_units(), 1_000);
        assert_eq!(plan.choices(), vec![1, 0]);

        Ok(())
    }

    #[test]
    fn from_choices_rejects_wrong_length() -> TestResult {
        let dataset = dataset()?;

        let result = AssignmentPlan::from_choices(&dataset, &[0]);

        assert!(matches!(
            result,
            Err(AssignmentError::ChoiceCount {
                expected: 2,
                found: 1
            })
        ));

        Ok(())
    }

    #[test]
    fn from_choices_rejects_unknown_coupon() -> TestResult {
        let dataset = dataset()?;

        let result = AssignmentPlan::from_choices(&dataset, &[0, 5]);

        assert!(matches!(
            result,
            Err(AssignmentError::Coupon(CouponError::CouponNotFound(5)))
        ));

        Ok(())
    }

    #[test]
    fn coupon_histogram_includes_unused_coupons() -> TestResult {
        let dataset = dataset()?;

        let plan = AssignmentPlan::from_choices(&dataset, &[0, 0])?;
        let histogram = plan.coupon_histogram();

        assert_eq!(histogram.get(&0), Some(&2));
        assert_eq!(histogram.get(&1), Some(&0));

        Ok(())
    }

    #[test]
    fn empty_plan_has_zero_totals() -> TestResult {
        let dataset = dataset()?;

        let plan = AssignmentPlan::empty(&dataset);

        assert!(plan.is_empty());
        assert_eq!(plan.expected_return(), Decimal::ZERO);
        assert_eq!(plan.issued_face_value()?.to_minor_units(), 0);

        Ok(())
    }
}
