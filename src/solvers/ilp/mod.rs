//! ILP Solver

use std::time::Instant;

use good_lp::{Expression, Solution, SolverModel};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::{debug, info};

#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs as default_solver;
#[cfg(all(not(feature = "solver-highs"), feature = "solver-microlp"))]
use good_lp::solvers::microlp::microlp as default_solver;

use crate::{
    assignments::AssignmentPlan,
    dataset::Dataset,
    returns::expected_cost,
    solvers::{
        BudgetBasis, SolveConstraints, Solver, SolverError, SolverResult,
        ilp::state::{ConstraintRelation, CouponVars, ILPConstraint},
    },
};

pub mod observer;
pub mod renderers;
pub(crate) mod state;

pub use observer::{ILPObserver, NoopObserver};
pub use state::ILPState;

/// Binary threshold for determining truthiness
pub const BINARY_THRESHOLD: f64 = 0.5;

/// Solver using Integer Linear Programming (ILP)
///
/// Maximises the total expected return `sum p_ij * (cltv_i - v_j) * x_ij` subject to
/// every customer receiving exactly one coupon, the global budget, and any
/// per-coupon issuance limits.
#[derive(Debug)]
pub struct ILPSolver;

impl ILPSolver {
    /// Solve with an observer for capturing the ILP formulation.
    ///
    /// The observer receives callbacks as the problem is constructed, enabling
    /// capture of variables, objective terms and constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] if the problem is infeasible or the solver fails.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use coupons::{
    ///     scenario::Scenario,
    ///     solvers::ilp::{ILPSolver, renderers::lp::LpRenderer},
    /// };
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let scenario = Scenario::from_file("scenarios/default.yml")?;
    /// let dataset = scenario.dataset()?;
    /// let baseline = scenario.baseline_policy()?.assign(&dataset)?;
    /// let constraints = scenario.resolve_budget(&baseline)?;
    ///
    /// let mut renderer = LpRenderer::new("formulation.lp");
    /// let result = ILPSolver::solve_with_observer(&dataset, &constraints, &mut renderer)?;
    ///
    /// renderer.write()?;
    ///
    /// assert_eq!(result.plan.len(), dataset.population().len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn solve_with_observer(
        dataset: &Dataset,
        constraints: &SolveConstraints,
        observer: &mut dyn ILPObserver,
    ) -> Result<SolverResult, SolverError> {
        // Return early if there is nobody to assign
        if dataset.population().is_empty() {
            return Ok(SolverResult {
                plan: AssignmentPlan::empty(dataset),
                objective: 0.0,
            });
        }

        check_feasibility(dataset, constraints)?;

        let start = Instant::now();

        // The problem has one binary variable per (customer, coupon) pair. The
        // objective rewards each pair with its expected return; the constraints force
        // a single coupon per customer and keep total spend within budget.
        let mut state = ILPState::with_assignment_variables_and_observer(dataset, observer)?;

        add_assignment_constraints(&mut state, observer);
        add_budget_constraint(&mut state, dataset, constraints, observer)?;
        add_coupon_limit_constraints(&mut state, dataset, observer);

        info!(
            customers = dataset.population().len(),
            coupons = dataset.coupons().len(),
            constraints = state.constraint_count(),
            budget = constraints.budget.to_minor_units(),
            basis = ?constraints.basis,
            "solving coupon assignment"
        );

        let (pb, objective, assignment, recorded) = state.into_parts();

        let model = pb.maximise(objective.clone()).using(default_solver);
        let model = apply_recorded_constraints(model, recorded);

        let solution = model.solve()?;

        let objective_value = solution.eval(&objective);
        let choices = extract_choices(&solution, &assignment)?;
        let plan = AssignmentPlan::from_choices(dataset, &choices)?;

        debug!(
            elapsed_ms = start.elapsed().as_millis(),
            objective = objective_value,
            "solver finished"
        );

        Ok(SolverResult {
            plan,
            objective: objective_value,
        })
    }
}

impl Solver for ILPSolver {
    fn solve(
        dataset: &Dataset,
        constraints: &SolveConstraints,
    ) -> Result<SolverResult, SolverError> {
        let mut observer = NoopObserver;

        Self::solve_with_observer(dataset, constraints, &mut observer)
    }
}

/// Reject problems that cannot have a solution before handing them to the solver.
fn check_feasibility(
    dataset: &Dataset,
    constraints: &SolveConstraints,
) -> Result<(), SolverError> {
    let budget = constraints.budget;

    if budget.currency() != dataset.currency() {
        return Err(SolverError::CurrencyMismatch(
            budget.currency().iso_alpha_code,
            dataset.currency().iso_alpha_code,
        ));
    }

    let customers = dataset.population().len();

    if let Some(capacity) = dataset.coupons().total_limit()
        && capacity < u64::try_from(customers).unwrap_or(u64::MAX)
    {
        return Err(SolverError::CouponLimitsInfeasible {
            capacity,
            customers,
        });
    }

    let budget_minor = budget.to_minor_units();

    let required = match constraints.basis {
        BudgetBasis::FaceValue => i64::try_from(customers)
            .ok()
            .and_then(|n| n.checked_mul(dataset.coupons().cheapest().to_minor_units()))
            .unwrap_or(i64::MAX),
        BudgetBasis::ExpectedCost => minimum_expected_cost(dataset)?,
    };

    if required > budget_minor {
        return Err(SolverError::BudgetInfeasible {
            required,
            budget: budget_minor,
        });
    }

    Ok(())
}

/// Sum over customers of their cheapest expected redemption cost, rounded up.
fn minimum_expected_cost(dataset: &Dataset) -> Result<i64, SolverError> {
    let mut total = Decimal::ZERO;

    for row in dataset.acceptance().rows() {
        let costs = dataset
            .coupons()
            .iter()
            .zip(row.iter().copied())
            .map(|(coupon, probability)| expected_cost(probability, coupon.face_value))
            .collect::<Result<SmallVec<[Decimal; 8]>, _>>()?;

        total += costs.into_iter().min().unwrap_or(Decimal::ZERO);
    }

    Ok(total.ceil().to_i64().unwrap_or(i64::MAX))
}

/// Each customer receives exactly one coupon.
fn add_assignment_constraints<O: ILPObserver + ?Sized>(
    state: &mut ILPState,
    observer: &mut O,
) {
    let expressions: Vec<Expression> = state
        .assignment()
        .iter()
        .map(|row| row.iter().copied().sum::<Expression>())
        .collect();

    for (customer_idx, expr) in expressions.into_iter().enumerate() {
        observer.on_assignment_constraint(customer_idx, &expr);

        state.add_constraint(expr, ConstraintRelation::Eq, 1.0);
    }
}

/// Total spend stays within budget.
fn add_budget_constraint<O: ILPObserver + ?Sized>(
    state: &mut ILPState,
    dataset: &Dataset,
    constraints: &SolveConstraints,
    observer: &mut O,
) -> Result<(), SolverError> {
    let budget_minor = constraints.budget.to_minor_units();
    let rhs = i64_to_f64_exact(budget_minor)
        .ok_or(SolverError::MinorUnitsNotRepresentable(budget_minor))?;

    let mut spend = Expression::default();
    let mut spend_terms = 0_usize;

    for (customer_idx, row) in state.assignment().iter().enumerate() {
        for (coupon_idx, (var, coupon)) in
            row.iter().copied().zip(dataset.coupons().iter()).enumerate()
        {
            let coeff = match constraints.basis {
                BudgetBasis::FaceValue => i64_to_f64_exact(coupon.minor_units())
                    .ok_or(SolverError::MinorUnitsNotRepresentable(coupon.minor_units()))?,
                BudgetBasis::ExpectedCost => {
                    let probability = dataset
                        .acceptance()
                        .get(customer_idx, coupon_idx)
                        .map_err(|_err| SolverError::InvariantViolation {
                            message: "acceptance matrix does not cover every customer and coupon",
                        })?;

                    expected_cost(probability, coupon.face_value)?
                        .to_f64()
                        .ok_or(SolverError::InvariantViolation {
                            message: "expected cost cannot be converted to a solver coefficient",
                        })?
                }
            };

            // Zero-value coupons never consume budget.
            if coeff != 0.0 {
                spend += var * coeff;
                spend_terms += 1;
            }
        }
    }

    // Nothing can consume budget, so there is nothing to constrain.
    if spend_terms == 0 {
        return Ok(());
    }

    observer.on_budget_constraint(constraints.basis, &spend, rhs);

    state.add_constraint(spend, ConstraintRelation::Leq, rhs);

    Ok(())
}

/// Capped coupons are issued to at most `limit` customers.
fn add_coupon_limit_constraints<O: ILPObserver + ?Sized>(
    state: &mut ILPState,
    dataset: &Dataset,
    observer: &mut O,
) {
    let limited: Vec<(usize, Expression, f64)> = dataset
        .coupons()
        .iter()
        .enumerate()
        .filter_map(|(coupon_idx, coupon)| {
            let limit = coupon.limit?;

            let issued: Expression = state
                .assignment()
                .iter()
                .filter_map(|row| row.get(coupon_idx).copied())
                .sum();

            Some((coupon_idx, issued, f64::from(limit)))
        })
        .collect();

    for (coupon_idx, expr, rhs) in limited {
        observer.on_coupon_limit_constraint(coupon_idx, &expr, rhs);

        state.add_constraint(expr, ConstraintRelation::Leq, rhs);
    }
}

fn apply_recorded_constraints<S: SolverModel>(mut model: S, constraints: Vec<ILPConstraint>) -> S {
    for constraint in constraints {
        model = match constraint.relation {
            ConstraintRelation::Eq => model.with(constraint.lhs.eq(constraint.rhs)),
            ConstraintRelation::Leq => model.with(constraint.lhs.leq(constraint.rhs)),
        };
    }

    model
}

/// Read back the single selected coupon for each customer.
fn extract_choices(
    solution: &impl Solution,
    assignment: &[CouponVars],
) -> Result<Vec<usize>, SolverError> {
    assignment
        .iter()
        .map(|row| {
            // The solver returns floats, so treat values greater than 0.5 as "selected"
            // to tolerate tiny numerical noise.
            let mut selected = row
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, var)| solution.value(*var) > BINARY_THRESHOLD)
                .map(|(coupon_idx, _)| coupon_idx);

            match (selected.next(), selected.next()) {
                (Some(coupon_idx), None) => Ok(coupon_idx),
                _ => Err(SolverError::InvariantViolation {
                    message: "customer was not assigned exactly one coupon",
                }),
            }
        })
        .collect()
}

/// Convert an `i64` to an `f64` if it can be represented exactly.
pub fn i64_to_f64_exact(v: i64) -> Option<f64> {
    let f = v.to_f64()?;

    (f.to_i64() == Some(v)).then_some(f)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use good_lp::{ProblemVariables, Variable, variable};
    use rusty_money::{
        Money,
        iso::{GBP, USD},
    };
    use testresult::TestResult;

    use crate::{
        acceptance::{AcceptanceMatrix, Probability},
        coupons::{Coupon, CouponSet},
        customers::{Customer, Population},
    };

    use super::*;

    fn p(value: i64) -> Result<Probability, crate::acceptance::AcceptanceError> {
        Probability::new(Decimal::new(value, 2))
    }

    /// Two customers, three coupons. Probabilities are in percent.
    fn dataset(coupons: CouponSet) -> Result<Dataset, Box<dyn std::error::Error>> {
        let population = Population::with_customers(
            [
                Customer::new("a", Money::from_minor(10_000, USD)),
                Customer::new("b", Money::from_minor(50_000, USD)),
            ],
            USD,
        )?;

        let acceptance = AcceptanceMatrix::new(
            vec![
                vec![p(10)?, p(30)?, p(40)?],
                vec![p(20)?, p(60)?, p(80)?],
            ],
            3,
        )?;

        Ok(Dataset::new(population, coupons, acceptance)?)
    }

    fn default_coupons() -> Result<CouponSet, crate::coupons::CouponError> {
        CouponSet::from_minor_units(&[0, 1_000, 2_000], USD)
    }

    #[test]
    fn unconstrained_budget_picks_best_coupon_per_customer() -> TestResult {
        let dataset = dataset(default_coupons()?)?;

        // a: 1000, 2700, 3200 -> coupon 2; b: 10000, 29400, 38400 -> coupon 2
        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(100_000, USD)),
        )?;

        assert_eq!(result.plan.choices(), vec![2, 2]);
        assert!((result.objective - 41_600.0).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn budget_forces_coupon_onto_most_valuable_customer() -> TestResult {
        let dataset = dataset(default_coupons()?)?;

        // Budget 2000: options are {a:2,b:0}=13200, {a:0,b:2}=39400, {a:1,b:1}=32100
        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(2_000, USD)),
        )?;

        assert_eq!(result.plan.choices(), vec![0, 2]);
        assert_eq!(result.plan.issued_face_value()?.to_minor_units(), 2_000);

        Ok(())
    }

    #[test]
    fn zero_budget_issues_only_zero_value_coupons() -> TestResult {
        let dataset = dataset(default_coupons()?)?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(0, USD)),
        )?;

        assert_eq!(result.plan.choices(), vec![0, 0]);

        Ok(())
    }

    #[test]
    fn budget_below_cheapest_coupon_is_infeasible() -> TestResult {
        let dataset = dataset(CouponSet::from_minor_units(&[500, 1_000, 2_000], USD)?)?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(999, USD)),
        );

        assert!(matches!(
            result,
            Err(SolverError::BudgetInfeasible {
                required: 1_000,
                budget: 999
            })
        ));

        Ok(())
    }

    #[test]
    fn coupon_limit_caps_issuance() -> TestResult {
        let coupons = CouponSet::new(
            [
                Coupon::new(Money::from_minor(0, USD)),
                Coupon::new(Money::from_minor(1_000, USD)),
                Coupon::with_limit(Money::from_minor(2_000, USD), 1),
            ],
            USD,
        )?;
        let dataset = dataset(coupons)?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(100_000, USD)),
        )?;

        // Only one customer may take coupon 2; b gains more from it.
        assert_eq!(result.plan.choices(), vec![1, 2]);

        Ok(())
    }

    #[test]
    fn coupon_limits_below_population_are_infeasible() -> TestResult {
        let coupons = CouponSet::new(
            [
                Coupon::with_limit(Money::from_minor(0, USD), 1),
                Coupon::with_limit(Money::from_minor(1_000, USD), 0),
            ],
            USD,
        )?;
        let population = Population::with_customers(
            [
                Customer::new("a", Money::from_minor(10_000, USD)),
                Customer::new("b", Money::from_minor(50_000, USD)),
            ],
            USD,
        )?;
        let acceptance = AcceptanceMatrix::new(vec![vec![Probability::ONE; 2]; 2], 2)?;
        let dataset = Dataset::new(population, coupons, acceptance)?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(10_000, USD)),
        );

        assert!(matches!(
            result,
            Err(SolverError::CouponLimitsInfeasible {
                capacity: 1,
                customers: 2
            })
        ));

        Ok(())
    }

    #[test]
    fn expected_cost_basis_allows_more_issuance() -> TestResult {
        let dataset = dataset(default_coupons()?)?;

        // Expected costs of coupon 2: a 800, b 1600. Budget 2400 covers both.
        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::expected_cost(Money::from_minor(2_400, USD)),
        )?;

        assert_eq!(result.plan.choices(), vec![2, 2]);
        assert!(result.plan.expected_cost() <= Decimal::from(2_400));

        Ok(())
    }

    #[test]
    fn budget_in_other_currency_is_rejected() -> TestResult {
        let dataset = dataset(default_coupons()?)?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(1_000, GBP)),
        );

        assert!(matches!(result, Err(SolverError::CurrencyMismatch("GBP", "USD"))));

        Ok(())
    }

    #[test]
    fn empty_population_returns_empty_plan() -> TestResult {
        let dataset = Dataset::new(
            Population::new(USD),
            default_coupons()?,
            AcceptanceMatrix::new(Vec::new(), 3)?,
        )?;

        let result = ILPSolver::solve(
            &dataset,
            &SolveConstraints::face_value(Money::from_minor(0, USD)),
        )?;

        assert!(result.plan.is_empty());
        assert!(result.objective.abs() < f64::EPSILON);

        Ok(())
    }

    #[test]
    fn extract_choices_rejects_unassigned_customer() {
        let mut pb = ProblemVariables::new();
        let row: CouponVars = (0..2).map(|_| pb.add(variable().binary())).collect();

        let solution: HashMap<Variable, f64> = row.iter().copied().map(|var| (var, 0.0)).collect();

        let result = extract_choices(&solution, &[row]);

        assert!(matches!(result, Err(SolverError::InvariantViolation { .. })));
    }

    #[test]
    fn extract_choices_rejects_double_assignment() {
        let mut pb = ProblemVariables::new();
        let row: CouponVars = (0..2).map(|_| pb.add(variable().binary())).collect();

        let solution: HashMap<Variable, f64> = row.iter().copied().map(|var| (var, 1.0)).collect();

        let result = extract_choices(&solution, &[row]);

        assert!(matches!(result, Err(SolverError::InvariantViolation { .. })));
    }

    #[test]
    fn extract_choices_tolerates_numerical_noise() -> TestResult {
        let mut pb = ProblemVariables::new();
        let row: CouponVars = (0..3).map(|_| pb.add(variable().binary())).collect();

        let solution: HashMap<Variable, f64> = row
            .iter()
            .copied()
            .zip([1e-9, 0.999_999_9, 0.0])
            .collect();

        assert_eq!(extract_choices(&solution, &[row])?, vec![1]);

        Ok(())
    }

    #[test]
    #[expect(
        clippy::cast_precision_loss,
        reason = "This is a test case for exact conversion"
    )]
    fn i64_to_f64_exact_accepts_exactly_representable_integers() {
        let cases: [i64; 5] = [0, 1, -1, 123, 9_007_199_254_740_992]; // 2^53

        for v in cases {
            assert_eq!(i64_to_f64_exact(v), Some(v as f64));
        }
    }

    #[test]
    fn i64_to_f64_exact_rejects_nonrepresentable_integers() {
        let cases: [i64; 2] = [9_007_199_254_740_993, -9_007_199_254_740_993]; // 2^53 + 1

        for v in cases {
            assert_eq!(i64_to_f64_exact(v), None);
        }
    }
}
