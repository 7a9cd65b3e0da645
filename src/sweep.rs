//! Budget Sweep
//!
//! Solves the assignment problem over a range of budgets to trace the efficient
//! frontier of expected return against spend.

use rust_decimal::Decimal;
use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    dataset::Dataset,
    solvers::{BudgetBasis, SolveConstraints, Solver, SolverError},
};

/// Errors that can occur while running a sweep.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A sweep needs at least one step.
    #[error("budget sweep needs at least one step")]
    NoSteps,

    /// The upper bound is below the lower bound.
    #[error("budget sweep range is empty: {from} to {to} minor units")]
    InvalidRange {
        /// Lower bound in minor units
        from: i64,
        /// Upper bound in minor units
        to: i64,
    },

    /// Bounds use different currencies.
    #[error("budget sweep bounds have currencies {0} and {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped solver error that is not an infeasible budget.
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Result of solving at a single budget.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// The problem was solved.
    Solved {
        /// Total expected net return in minor units
        expected_return: Decimal,

        /// Sum of issued coupon face values
        issued: Money<'static, Currency>,

        /// Total expected redemption cost in minor units
        expected_cost: Decimal,
    },

    /// The budget admits no feasible assignment.
    Skipped(String),
}

/// A point on the frontier.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontierPoint {
    /// Budget the point was solved at
    pub budget: Money<'static, Currency>,

    /// Outcome at this budget
    pub outcome: SweepOutcome,
}

/// Evenly spaced budgets between two bounds, inclusive.
#[derive(Debug, Clone, Copy)]
pub struct BudgetSweep {
    /// Lowest budget
    pub from: Money<'static, Currency>,

    /// Highest budget
    pub to: Money<'static, Currency>,

    /// Number of budgets to solve
    pub steps: usize,

    /// What the budget is measured against
    pub basis: BudgetBasis,
}

impl BudgetSweep {
    /// Budgets visited by the sweep, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns a [`SweepError`] if the range is empty, mixes currencies or has no steps.
    pub fn budgets(&self) -> Result<Vec<Money<'static, Currency>>, SweepError> {
        if self.steps == 0 {
            return Err(SweepError::NoSteps);
        }

        if self.from.currency() != self.to.currency() {
            return Err(SweepError::CurrencyMismatch(
                self.from.currency().iso_alpha_code,
                self.to.currency().iso_alpha_code,
            ));
        }

        let from = self.from.to_minor_units();
        let to = self.to.to_minor_units();

        if to < from {
            return Err(SweepError::InvalidRange { from, to });
        }

        if self.steps == 1 {
            return Ok(vec![self.from]);
        }

        let span = i128::from(to) - i128::from(from);
        let intervals = i128::try_from(self.steps - 1).unwrap_or(i128::MAX);

        let budgets = (0..self.steps)
            .map(|step| {
                let step = i128::try_from(step).unwrap_or(i128::MAX);
                let offset = span * step / intervals;

                // offset never exceeds span, so the sum stays within [from, to]
                let minor = i64::try_from(i128::from(from) + offset).unwrap_or(to);

                Money::from_minor(minor, self.from.currency())
            })
            .collect();

        Ok(budgets)
    }

    /// Solve the dataset at each budget with solver `S`.
    ///
    /// Budgets that admit no feasible assignment are recorded as skipped points.
    ///
    /// # Errors
    ///
    /// Returns a [`SweepError`] if the budgets are invalid or the solver fails for a
    /// reason other than infeasibility.
    pub fn run<S: Solver>(&self, dataset: &Dataset) -> Result<Vec<FrontierPoint>, SweepError> {
        let budgets = self.budgets()?;

        info!(
            steps = budgets.len(),
            from = self.from.to_minor_units(),
            to = self.to.to_minor_units(),
            basis = ?self.basis,
            "running budget sweep"
        );

        budgets
            .into_iter()
            .map(|budget| {
                let constraints = SolveConstraints {
                    budget,
                    basis: self.basis,
                };

                let outcome = match S::solve(dataset, &constraints) {
                    Ok(result) => SweepOutcome::Solved {
                        expected_return: result.plan.expected_return(),
                        issued: result.plan.issued_face_value()?,
                        expected_cost: result.plan.expected_cost(),
                    },
                    Err(
                        err @ (SolverError::BudgetInfeasible { .. }
                        | SolverError::CouponLimitsInfeasible { .. }),
                    ) => {
                        warn!(budget = budget.to_minor_units(), error = %err, "skipping budget");

                        SweepOutcome::Skipped(err.to_string())
                    }
                    Err(err) => return Err(SweepError::Solver(err)),
                };

                Ok(FrontierPoint { budget, outcome })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, USD};
    use testresult::TestResult;

    use crate::{
        acceptance::{AcceptanceMatrix, Probability},
        coupons::CouponSet,
        customers::{Customer, Population},
        solvers::ilp::ILPSolver,
    };

    use super::*;

    fn sweep(from: i64, to: i64, steps: usize) -> BudgetSweep {
        BudgetSweep {
            from: Money::from_minor(from, USD),
            to: Money::from_minor(to, USD),
            steps,
            basis: BudgetBasis::FaceValue,
        }
    }

    fn minor(budgets: &[Money<'static, Currency>]) -> Vec<i64> {
        budgets.iter().map(Money::to_minor_units).collect()
    }

    #[test]
    fn budgets_are_evenly_spaced_and_inclusive() -> TestResult {
        assert_eq!(minor(&sweep(0, 1_000, 5).budgets()?), vec![0, 250, 500, 750, 1_000]);
        assert_eq!(minor(&sweep(0, 10, 4).budgets()?), vec![0, 3, 6, 10]);
        assert_eq!(minor(&sweep(700, 900, 1).budgets()?), vec![700]);

        Ok(())
    }

    #[test]
    fn rejects_invalid_sweeps() {
        assert!(matches!(sweep(0, 100, 0).budgets(), Err(SweepError::NoSteps)));
        assert!(matches!(
            sweep(100, 0, 3).budgets(),
            Err(SweepError::InvalidRange { from: 100, to: 0 })
        ));

        let mixed = BudgetSweep {
            to: Money::from_minor(100, GBP),
            ..sweep(0, 100, 3)
        };

        assert!(matches!(
            mixed.budgets(),
            Err(SweepError::CurrencyMismatch("USD", "GBP"))
        ));
    }

    #[test]
    fn infeasible_budgets_are_skipped() -> TestResult {
        let dataset = Dataset::new(
            Population::with_customers([Customer::new("a", Money::from_minor(10_000, USD))], USD)?,
            CouponSet::from_minor_units(&[500, 1_000], USD)?,
            AcceptanceMatrix::new(
                vec![vec![
                    Probability::new(Decimal::new(2, 1))?,
                    Probability::new(Decimal::new(5, 1))?,
                ]],
                2,
            )?,
        )?;

        let points = sweep(0, 1_000, 3).run::<ILPSolver>(&dataset)?;

        assert_eq!(points.len(), 3);
        assert!(matches!(points.first().map(|p| &p.outcome), Some(SweepOutcome::Skipped(_))));

        // 500: only the cheap coupon fits, 0.2 * 9500
        assert_eq!(
            points.get(1).map(|p| p.outcome.clone()),
            Some(SweepOutcome::Solved {
                expected_return: Decimal::from(1_900),
                issued: Money::from_minor(500, USD),
                expected_cost: Decimal::from(100),
            })
        );

        // 1000: the larger coupon wins, 0.5 * 9000
        assert!(matches!(
            points.get(2).map(|p| &p.outcome),
            Some(SweepOutcome::Solved { expected_return, .. }) if *expected_return == Decimal::from(4_500)
        ));

        Ok(())
    }
}
