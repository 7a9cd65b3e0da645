//! ILP State

use std::fmt;

use good_lp::{Expression, ProblemVariables, Variable, variable};
use num_traits::ToPrimitive;
use smallvec::SmallVec;

use crate::{
    dataset::Dataset,
    returns::expected_return,
    solvers::{
        SolverError,
        ilp::{i64_to_f64_exact, observer::ILPObserver},
    },
};

/// Assignment variables for one customer, one per coupon.
pub(crate) type CouponVars = SmallVec<[Variable; 8]>;

/// Relation operator for a linear ILP constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConstraintRelation {
    /// Equality (`lhs == rhs`)
    Eq,

    /// Less than or equal (`lhs <= rhs`)
    Leq,
}

/// Recorded linear ILP constraint emitted during model construction.
#[derive(Debug, Clone)]
pub(crate) struct ILPConstraint {
    /// Left-hand side expression
    pub(crate) lhs: Expression,

    /// Relation operator
    pub(crate) relation: ConstraintRelation,

    /// Right-hand side scalar
    pub(crate) rhs: f64,
}

/// Builder state for ILP problem variables, objective and constraints
pub struct ILPState {
    pb: ProblemVariables,
    objective: Expression,
    assignment: Vec<CouponVars>,
    constraints: Vec<ILPConstraint>,
}

impl fmt::Debug for ILPState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ILPState")
            .field("pb", &"<ProblemVariables>")
            .field("objective", &"<Expression>")
            .field(
                "assignment",
                &format!("[{} customers]", self.assignment.len()),
            )
            .field(
                "constraints",
                &format!("[{} constraints]", self.constraints.len()),
            )
            .finish()
    }
}

impl ILPState {
    /// Create ILP state with one binary variable per (customer, coupon) pair.
    ///
    /// Each variable's objective coefficient is the expected return of issuing
    /// that coupon to that customer.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError`] if a lifetime value or face value cannot be
    /// represented exactly as a solver coefficient, or an expected return cannot
    /// be computed.
    pub(crate) fn with_assignment_variables_and_observer<O: ILPObserver + ?Sized>(
        dataset: &Dataset,
        observer: &mut O,
    ) -> Result<Self, SolverError> {
        let mut pb = ProblemVariables::new();
        let mut objective = Expression::default();
        let mut assignment = Vec::with_capacity(dataset.population().len());

        for (customer_idx, customer) in dataset.population().iter().enumerate() {
            let cltv_minor = customer.cltv.to_minor_units();

            // `good_lp` stores coefficients as `f64`. Reject amounts beyond 2^53 so the
            // objective is never silently perturbed.
            i64_to_f64_exact(cltv_minor)
                .ok_or(SolverError::MinorUnitsNotRepresentable(cltv_minor))?;

            let mut row = CouponVars::new();

            for (coupon_idx, coupon) in dataset.coupons().iter().enumerate() {
                let face_minor = coupon.minor_units();

                i64_to_f64_exact(face_minor)
                    .ok_or(SolverError::MinorUnitsNotRepresentable(face_minor))?;

                let probability = dataset.acceptance().get(customer_idx, coupon_idx).map_err(
                    |_err| SolverError::InvariantViolation {
                        message: "acceptance matrix does not cover every customer and coupon",
                    },
                )?;

                let coeff = expected_return(probability, customer.cltv, coupon.face_value)?
                    .to_f64()
                    .ok_or(SolverError::InvariantViolation {
                        message: "expected return cannot be converted to a solver coefficient",
                    })?;

                let var = pb.add(variable().binary());

                objective += var * coeff;
                row.push(var);

                observer.on_assignment_variable(customer_idx, coupon_idx, var, face_minor);
                observer.on_objective_term(var, coeff);
            }

            assignment.push(row);
        }

        Ok(Self {
            pb,
            objective,
            assignment,
            constraints: Vec::new(),
        })
    }

    /// Assignment variables, one row per customer.
    pub(crate) fn assignment(&self) -> &[CouponVars] {
        &self.assignment
    }

    /// Record a constraint to be added to the model.
    pub(crate) fn add_constraint(
        &mut self,
        lhs: Expression,
        relation: ConstraintRelation,
        rhs: f64,
    ) {
        self.constraints.push(ILPConstraint { lhs, relation, rhs });
    }

    /// Number of recorded constraints.
    pub(crate) fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Consume the state, returning the problem, objective, assignment variables
    /// and recorded constraints.
    pub(crate) fn into_parts(
        self,
    ) -> (
        ProblemVariables,
        Expression,
        Vec<CouponVars>,
        Vec<ILPConstraint>,
    ) {
        (self.pb, self.objective, self.assignment, self.constraints)
    }
}
