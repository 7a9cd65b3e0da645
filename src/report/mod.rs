//! Report
//!
//! Tabular console output for a comparison between the baseline and optimised
//! policies, and for budget sweeps.

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use rusty_money::{MoneyError, iso::Currency};
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    assignments::AssignmentPlan,
    comparison::{Comparison, ComparisonError, PolicySummary},
    customers::PopulationError,
    dataset::Dataset,
    returns::{ReturnsError, to_money},
    sweep::{FrontierPoint, SweepOutcome},
};

/// Errors that can occur when writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapper for expected value rounding errors.
    #[error(transparent)]
    Returns(#[from] ReturnsError),

    /// Wrapper for comparison errors.
    #[error(transparent)]
    Comparison(#[from] ComparisonError),

    /// Wrapper for customer lookup errors.
    #[error(transparent)]
    Population(#[from] PopulationError),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Comparison report for a single dataset.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    dataset: &'a Dataset,
    baseline: &'a AssignmentPlan,
    optimised: &'a AssignmentPlan,
    comparison: Comparison,
    details: bool,
}

impl<'a> Report<'a> {
    /// Build a report for two plans over `dataset`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] if the plans cannot be compared.
    pub fn new(
        dataset: &'a Dataset,
        baseline: &'a AssignmentPlan,
        optimised: &'a AssignmentPlan,
    ) -> Result<Self, ReportError> {
        Ok(Report {
            dataset,
            baseline,
            optimised,
            comparison: Comparison::new(baseline, optimised)?,
            details: false,
        })
    }

    /// Include a per-customer table.
    #[must_use]
    pub fn with_details(mut self, details: bool) -> Self {
        self.details = details;
        self
    }

    /// Writes the report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReportError> {
        write_table(&mut out, "Coupons issued", self.histogram_table(), 1..4)?;

        if self.details {
            write_table(&mut out, "Customers", self.details_table()?, 2..7)?;
        }

        write_table(&mut out, "Summary", self.summary_table()?, 1..5)?;

        let currency = self.dataset.currency();
        let uplift = to_money(self.comparison.uplift(), currency)?;
        let uplift_points = percent_points(self.comparison.relative_uplift());

        writeln!(out, " Uplift: {uplift} ({uplift_points:.2}%)\n")
            .map_err(|_err| ReportError::IO)
    }

    fn histogram_table(&self) -> Builder {
        let mut builder = Builder::default();

        builder.push_record(["Coupon", "Limit", "BAU", "Optimised"]);

        let baseline = self.baseline.coupon_histogram();
        let optimised = self.optimised.coupon_histogram();

        for (coupon_idx, coupon) in self.dataset.coupons().iter().enumerate() {
            builder.push_record([
                format!("{}", coupon.face_value),
                coupon
                    .limit
                    .map_or_else(|| "-".to_string(), |limit| limit.to_string()),
                baseline.get(&coupon_idx).copied().unwrap_or(0).to_string(),
                optimised.get(&coupon_idx).copied().unwrap_or(0).to_string(),
            ]);
        }

        builder
    }

    fn summary_table(&self) -> Result<Builder, ReportError> {
        let mut builder = Builder::default();

        builder.push_record(["Policy", "Expected return", "Issued", "Expected cost", "ROI"]);

        let currency = self.dataset.currency();

        builder.push_record(summary_row("BAU", &self.comparison.baseline, currency)?);
        builder.push_record(summary_row("Optimised", &self.comparison.optimised, currency)?);

        Ok(builder)
    }

    fn details_table(&self) -> Result<Builder, ReportError> {
        let mut builder = Builder::default();

        builder.push_record([
            "#",
            "Customer",
            "CLTV",
            "BAU coupon",
            "BAU p",
            "Optimised coupon",
            "Optimised p",
        ]);

        for (baseline, optimised) in self.baseline.iter().zip(self.optimised.iter()) {
            let customer = self
                .dataset
                .population()
                .get_customer(baseline.customer_idx)?;

            builder.push_record([
                format!("#{:<4}", baseline.customer_idx + 1),
                customer.name.clone(),
                format!("{}", customer.cltv),
                format!("{}", baseline.face_value),
                baseline.probability.to_string(),
                format!("{}", optimised.face_value),
                optimised.probability.to_string(),
            ]);
        }

        Ok(builder)
    }
}

/// Writes the frontier of a budget sweep.
///
/// # Errors
///
/// Returns an error if the table cannot be written.
pub fn write_frontier(
    mut out: impl io::Write,
    points: &[FrontierPoint],
) -> Result<(), ReportError> {
    let mut builder = Builder::default();

    builder.push_record(["Budget", "Expected return", "Issued", "Expected cost", "Note"]);

    for point in points {
        let currency = point.budget.currency();

        match &point.outcome {
            SweepOutcome::Solved {
                expected_return,
                issued,
                expected_cost,
            } => builder.push_record([
                format!("{}", point.budget),
                format!("{}", to_money(*expected_return, currency)?),
                format!("{issued}"),
                format!("{}", to_money(*expected_cost, currency)?),
                String::new(),
            ]),
            SweepOutcome::Skipped(reason) => builder.push_record([
                format!("{}", point.budget),
                String::new(),
                String::new(),
                String::new(),
                reason.clone(),
            ]),
        }
    }

    write_table(&mut out, "Budget frontier", builder, 0..4)
}

fn summary_row(
    label: &str,
    summary: &PolicySummary,
    currency: &'static Currency,
) -> Result<[String; 5], ReportError> {
    Ok([
        label.to_string(),
        format!("{}", to_money(summary.expected_return, currency)?),
        format!("{}", summary.issued),
        format!("{}", to_money(summary.expected_cost, currency)?),
        summary
            .roi()
            .map_or_else(|| "-".to_string(), |roi| format!("{:.2}", roi.round_dp(2))),
    ])
}

fn write_table(
    out: &mut impl io::Write,
    title: &str,
    builder: Builder,
    numeric_columns: std::ops::Range<usize>,
) -> Result<(), ReportError> {
    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(numeric_columns), Alignment::right());

    writeln!(out, "\n {title}\n{table}").map_err(|_err| ReportError::IO)
}

fn percent_points(percentage: Percentage) -> Decimal {
    // `Percentage` is a fraction (e.g. 0.25), so multiply by 100 to print percent points.
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}
