//! ILP Observer

use good_lp::{Expression, Variable};

use crate::solvers::BudgetBasis;

/// Observer trait for capturing ILP formulation as it's built.
///
/// This trait provides callbacks at key points during ILP construction,
/// allowing external observers to capture the complete mathematical formulation
/// (variables, objective, and constraints) without duplicating solver logic.
///
/// The solver remains the only implementation of ILP construction; observers
/// passively record what happens for rendering or analysis purposes.
pub trait ILPObserver {
    /// Called when an assignment variable is created.
    ///
    /// `x[customer][coupon] = 1` means the customer receives that coupon.
    ///
    /// # Parameters
    ///
    /// - `customer_idx`: Index of the customer in the population
    /// - `coupon_idx`: Index of the coupon in the coupon set
    /// - `var`: The binary decision variable
    /// - `face_value_minor`: Coupon face value in minor units
    fn on_assignment_variable(
        &mut self,
        customer_idx: usize,
        coupon_idx: usize,
        var: Variable,
        face_value_minor: i64,
    );

    /// Called when a term is added to the objective function.
    ///
    /// # Parameters
    ///
    /// - `var`: The decision variable
    /// - `coefficient`: Expected return in minor units
    fn on_objective_term(&mut self, _var: Variable, _coefficient: f64) {}

    /// Called when the one-coupon-per-customer constraint is added.
    ///
    /// # Parameters
    ///
    /// - `customer_idx`: Index of the customer
    /// - `constraint_expr`: The constraint expression (sum of variables = 1)
    fn on_assignment_constraint(&mut self, customer_idx: usize, constraint_expr: &Expression);

    /// Called when the global budget constraint is added.
    ///
    /// # Parameters
    ///
    /// - `basis`: What the budget is measured against
    /// - `constraint_expr`: The left-hand side expression
    /// - `rhs`: Budget in minor units
    fn on_budget_constraint(&mut self, basis: BudgetBasis, constraint_expr: &Expression, rhs: f64);

    /// Called when a per-coupon issuance limit is added.
    ///
    /// # Parameters
    ///
    /// - `coupon_idx`: Index of the capped coupon
    /// - `constraint_expr`: The left-hand side expression
    /// - `rhs`: Maximum number of customers
    fn on_coupon_limit_constraint(
        &mut self,
        _coupon_idx: usize,
        _constraint_expr: &Expression,
        _rhs: f64,
    ) {
    }
}

/// No-op observer for unobserved solves.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ILPObserver for NoopObserver {
    fn on_assignment_variable(&mut self, _: usize, _: usize, _: Variable, _: i64) {}

    fn on_assignment_constraint(&mut self, _: usize, _: &Expression) {}

    fn on_budget_constraint(&mut self, _: BudgetBasis, _: &Expression, _: f64) {}
}
