//! Coupons prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    acceptance::{AcceptanceError, AcceptanceMatrix, Probability},
    assignments::{Assignment, AssignmentError, AssignmentPlan},
    baseline::{BaselineError, BaselinePolicy},
    comparison::{Comparison, ComparisonError, PolicySummary},
    coupons::{Coupon, CouponError, CouponSet},
    customers::{Customer, Population, PopulationError},
    dataset::{
        Dataset, DatasetError,
        synthetic::{SyntheticConfig, SyntheticError, generate},
    },
    report::{Report, ReportError, write_frontier},
    scenario::{Budget, DatasetFile, Scenario, ScenarioError},
    solvers::{
        BudgetBasis, SolveConstraints, Solver, SolverError, SolverResult,
        ilp::{
            ILPObserver, ILPSolver, NoopObserver,
            renderers::lp::{LpRenderError, LpRenderer},
        },
    },
    sweep::{BudgetSweep, FrontierPoint, SweepError, SweepOutcome},
};
