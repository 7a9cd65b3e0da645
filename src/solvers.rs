//! Solvers for Coupon Assignment

use good_lp::ResolutionError;
use rusty_money::{Money, MoneyError, iso::Currency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    assignments::{AssignmentError, AssignmentPlan},
    dataset::Dataset,
    returns::ReturnsError,
};

pub mod ilp;

/// Solver Errors
#[derive(Debug, Error)]
pub enum SolverError {
    /// Money amount in minor units cannot be represented exactly as a solver coefficient.
    #[error(
        "money amount in minor units cannot be represented exactly as a solver coefficient: {0}"
    )]
    MinorUnitsNotRepresentable(i64),

    /// The budget cannot cover even the cheapest coupon for every customer.
    #[error("budget of {budget} minor units is below the minimum required spend of {required}")]
    BudgetInfeasible {
        /// Minimum spend in minor units (cheapest coupon for every customer)
        required: i64,
        /// Budget in minor units
        budget: i64,
    },

    /// Every coupon is capped and the caps cannot cover the whole population.
    #[error("coupon issuance limits allow {capacity} coupons but there are {customers} customers")]
    CouponLimitsInfeasible {
        /// Sum of all coupon limits
        capacity: u64,
        /// Number of customers
        customers: usize,
    },

    /// Budget is in a different currency from the dataset.
    #[error("budget has currency {0}, but dataset has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// Wrapped money arithmetic or currency mismatch error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped expected value error.
    #[error(transparent)]
    Returns(#[from] ReturnsError),

    /// Wrapped assignment evaluation error.
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    /// Wrapped solver resolution error
    #[error(transparent)]
    ResolutionError(#[from] ResolutionError),

    /// Internal solver invariant was violated (this is a bug).
    #[error("solver invariant violated: {message}")]
    InvariantViolation {
        /// What invariant was violated
        message: &'static str,
    },
}

/// What the budget constraint limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetBasis {
    /// Sum of issued coupon face values
    #[default]
    FaceValue,

    /// Sum of expected redemption costs (`p * face value`)
    ExpectedCost,
}

/// Constraints applied to a solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveConstraints {
    /// Global coupon budget
    pub budget: Money<'static, Currency>,

    /// What the budget is measured against
    pub basis: BudgetBasis,
}

impl SolveConstraints {
    /// Budget measured against issued face values.
    pub fn face_value(budget: Money<'static, Currency>) -> Self {
        SolveConstraints {
            budget,
            basis: BudgetBasis::FaceValue,
        }
    }

    /// Budget measured against expected redemption costs.
    pub fn expected_cost(budget: Money<'static, Currency>) -> Self {
        SolveConstraints {
            budget,
            basis: BudgetBasis::ExpectedCost,
        }
    }
}

/// Result of solving the assignment problem for a dataset
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// The optimised coupon for each customer
    pub plan: AssignmentPlan,

    /// Objective value reported by the solver (expected return, minor units)
    pub objective: f64,
}

/// Trait for solving coupon assignment problems
pub trait Solver {
    /// Solve the assignment problem for the given dataset
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] if the solver encounters an error.
    fn solve(
        dataset: &Dataset,
        constraints: &SolveConstraints,
    ) -> Result<SolverResult, SolverError>;
}
