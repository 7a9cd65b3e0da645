//! CPLEX LP Renderer
//!
//! Captures the ILP formulation while it is built and writes it in the CPLEX LP
//! text format, so the exact model can be inspected or fed to another solver.
//!
//! ```text
//! \ Coupon assignment
//! Maximize
//!  obj: 1000 x_0_0 + 2700 x_0_1
//! Subject To
//!  assign_0: x_0_0 + x_0_1 = 1
//!  budget: 1000 x_0_1 <= 5000
//! Binary
//!  x_0_0
//!  x_0_1
//! End
//! ```

use std::{
    fs::File,
    io::Write as _,
    path::{Path, PathBuf},
};

use good_lp::{Expression, IntoAffineExpression, Variable};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::solvers::{BudgetBasis, ilp::ILPObserver};

/// Errors that can occur during LP rendering.
#[derive(Debug, Error)]
pub enum LpRenderError {
    /// Failed to write to the output file.
    #[error("Failed to write to output file: {0}")]
    IoError(#[from] std::io::Error),
}

/// A captured linear constraint.
#[derive(Debug, Clone)]
pub struct CapturedConstraint {
    /// Constraint name
    pub name: String,

    /// Left-hand side expression
    pub lhs: Expression,

    /// Relation operator (`=` or `<=`)
    pub relation: &'static str,

    /// Right-hand side scalar
    pub rhs: f64,
}

/// LP renderer that implements [`ILPObserver`].
#[derive(Debug, Clone)]
pub struct LpRenderer {
    output_path: PathBuf,

    /// Variable -> (customer, coupon)
    positions: FxHashMap<Variable, (usize, usize)>,
    variables: Vec<Variable>,

    objective: Vec<(Variable, f64)>,
    constraints: Vec<CapturedConstraint>,
}

impl LpRenderer {
    /// Create a renderer that writes to `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            positions: FxHashMap::default(),
            variables: Vec::new(),
            objective: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Output path of the LP file.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Captured constraints, in the order they were added.
    pub fn constraints(&self) -> &[CapturedConstraint] {
        &self.constraints
    }

    /// Number of captured decision variables.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Render the captured formulation as CPLEX LP text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("\\ Coupon assignment\n");
        out.push_str("Maximize\n");

        let objective: Expression = self
            .objective
            .iter()
            .map(|(var, coeff)| *var * *coeff)
            .sum();

        out.push_str(&format!(" obj: {}\n", self.render_expression(&objective)));

        out.push_str("Subject To\n");

        for constraint in &self.constraints {
            out.push_str(&format!(
                " {}: {} {} {}\n",
                constraint.name,
                self.render_expression(&constraint.lhs),
                constraint.relation,
                render_number(constraint.rhs)
            ));
        }

        out.push_str("Binary\n");

        for var in &self.variables {
            out.push_str(&format!(" {}\n", self.label(*var)));
        }

        out.push_str("End\n");

        out
    }

    /// Write the rendered formulation to the output file.
    ///
    /// # Errors
    ///
    /// Returns [`LpRenderError::IoError`] if the file cannot be created or written.
    pub fn write(&self) -> Result<(), LpRenderError> {
        let mut file = File::create(&self.output_path)?;

        file.write_all(self.render().as_bytes())?;

        Ok(())
    }

    fn sort_key(&self, var: Variable) -> (usize, usize) {
        self.positions
            .get(&var)
            .copied()
            .unwrap_or((usize::MAX, usize::MAX))
    }

    fn label(&self, var: Variable) -> String {
        match self.positions.get(&var) {
            Some((customer_idx, coupon_idx)) => format!("x_{customer_idx}_{coupon_idx}"),
            None => "x_unknown".to_string(),
        }
    }

    fn render_expression(&self, expr: &Expression) -> String {
        let mut terms: Vec<(Variable, f64)> = expr.linear_coefficients().collect();

        terms.sort_by_key(|(var, _)| self.sort_key(*var));

        let mut out = String::new();

        for (var, coeff) in terms {
            if coeff == 0.0 {
                continue;
            }

            let sign = if coeff < 0.0 { "-" } else { "+" };
            let magnitude = coeff.abs();

            if out.is_empty() {
                if coeff < 0.0 {
                    out.push_str("- ");
                }
            } else {
                out.push(' ');
                out.push_str(sign);
                out.push(' ');
            }

            if (magnitude - 1.0).abs() >= f64::EPSILON {
                out.push_str(&render_number(magnitude));
                out.push(' ');
            }

            out.push_str(&self.label(var));
        }

        if out.is_empty() {
            out.push('0');
        }

        out
    }
}

impl ILPObserver for LpRenderer {
    fn on_assignment_variable(
        &mut self,
        customer_idx: usize,
        coupon_idx: usize,
        var: Variable,
        _face_value_minor: i64,
    ) {
        self.positions.insert(var, (customer_idx, coupon_idx));
        self.variables.push(var);
    }

    fn on_objective_term(&mut self, var: Variable, coefficient: f64) {
        self.objective.push((var, coefficient));
    }

    fn on_assignment_constraint(&mut self, customer_idx: usize, constraint_expr: &Expression) {
        self.constraints.push(CapturedConstraint {
            name: format!("assign_{customer_idx}"),
            lhs: constraint_expr.clone(),
            relation: "=",
            rhs: 1.0,
        });
    }

    fn on_budget_constraint(&mut self, basis: BudgetBasis, constraint_expr: &Expression, rhs: f64) {
        let name = match basis {
            BudgetBasis::FaceValue => "budget",
            BudgetBasis::ExpectedCost => "expected_budget",
        };

        self.constraints.push(CapturedConstraint {
            name: name.to_string(),
            lhs: constraint_expr.clone(),
            relation: "<=",
            rhs,
        });
    }

    fn on_coupon_limit_constraint(
        &mut self,
        coupon_idx: usize,
        constraint_expr: &Expression,
        rhs: f64,
    ) {
        self.constraints.push(CapturedConstraint {
            name: format!("limit_{coupon_idx}"),
            lhs: constraint_expr.clone(),
            relation: "<=",
            rhs,
        });
    }
}

/// Render a coefficient without a trailing `.0` for whole numbers.
fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}
