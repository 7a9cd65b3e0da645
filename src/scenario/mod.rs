//! Scenarios
//!
//! YAML descriptions of a synthetic experiment:
//!
//! ```yaml
//! currency: USD
//! seed: 42
//! customers: 200
//! cltv: { min: "50.00 USD", max: "1500.00 USD" }
//! coupons:
//!   - "0.00 USD"
//!   - { value: "5.00 USD" }
//!   - { value: "50.00 USD", limit: 20 }
//! baseline_rate: "10%"
//! budget: bau
//! budget_basis: face_value
//! ```

use std::{fs, path::Path, str::FromStr};

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use rusty_money::{
    Money, MoneyError,
    iso::{Currency, EUR, GBP, USD},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    acceptance::AcceptanceError,
    assignments::AssignmentPlan,
    baseline::BaselinePolicy,
    coupons::{Coupon, CouponError, CouponSet},
    customers::PopulationError,
    dataset::{
        Dataset, DatasetError,
        synthetic::{SyntheticConfig, SyntheticError, generate},
    },
    returns::{ReturnsError, to_money},
    solvers::{BudgetBasis, SolveConstraints},
};

pub mod dataset_file;

pub use dataset_file::DatasetFile;

/// Keyword selecting the BAU plan's spend as the budget.
pub const BAU_BUDGET: &str = "bau";

/// Scenario Parsing Errors
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// IO error reading or writing scenario files
    #[error("Failed to access scenario file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Invalid probability format
    #[error("Invalid probability: {0}")]
    InvalidProbability(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A price uses a different currency from the scenario
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// Wrapped coupon error.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Wrapped population error.
    #[error(transparent)]
    Population(#[from] PopulationError),

    /// Wrapped acceptance error.
    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    /// Wrapped synthetic generation error.
    #[error(transparent)]
    Synthetic(#[from] SyntheticError),

    /// Wrapped dataset error.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Wrapped money error.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Wrapped expected value error.
    #[error(transparent)]
    Returns(#[from] ReturnsError),
}

/// Bounds for generated customer lifetime values.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CltvRange {
    /// Lowest value (e.g., "50.00 USD")
    pub min: String,

    /// Highest value (e.g., "1500.00 USD")
    pub max: String,
}

/// A candidate coupon: either a bare price or a price with an issuance limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CouponEntry {
    /// Uncapped coupon (e.g., "5.00 USD")
    Value(String),

    /// Coupon with optional limit
    Detailed {
        /// Face value (e.g., "50.00 USD")
        value: String,

        /// Maximum number of customers who may receive it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
}

impl CouponEntry {
    fn to_coupon(&self, currency: &'static Currency) -> Result<Coupon, ScenarioError> {
        let (value, limit) = match self {
            CouponEntry::Value(value) => (value, None),
            CouponEntry::Detailed { value, limit } => (value, *limit),
        };

        let face_value = parse_money(value, currency)?;

        Ok(match limit {
            Some(limit) => Coupon::with_limit(face_value, limit),
            None => Coupon::new(face_value),
        })
    }
}

/// Budget for the optimised policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Budget {
    /// Whatever the BAU plan spends
    Bau,

    /// A fixed amount
    Fixed(Money<'static, Currency>),
}

/// Scenario file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    /// Currency code for every amount in the scenario
    pub currency: String,

    /// Random seed
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of customers to generate
    pub customers: usize,

    /// Customer lifetime value bounds
    pub cltv: CltvRange,

    /// Candidate coupons
    pub coupons: Vec<CouponEntry>,

    /// Share of lifetime value the BAU policy offers (e.g., "10%")
    #[serde(default = "default_baseline_rate")]
    pub baseline_rate: String,

    /// `bau` or a fixed amount (e.g., "2500.00 USD")
    #[serde(default = "default_budget")]
    pub budget: String,

    /// What the budget is measured against
    #[serde(default)]
    pub budget_basis: BudgetBasis,
}

fn default_seed() -> u64 {
    42
}

fn default_baseline_rate() -> String {
    "10%".to_string()
}

fn default_budget() -> String {
    BAU_BUDGET.to_string()
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_norway::from_str(s)?)
    }
}

impl Scenario {
    /// Load a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;

        contents.parse()
    }

    /// Scenario currency.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownCurrency`] if the code is not supported.
    pub fn currency(&self) -> Result<&'static Currency, ScenarioError> {
        parse_currency(&self.currency)
    }

    /// Candidate coupon set.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if a price is invalid or the set is rejected.
    pub fn coupon_set(&self) -> Result<CouponSet, ScenarioError> {
        coupon_set(&self.coupons, self.currency()?)
    }

    /// Parameters for the synthetic generator.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if a price is invalid.
    pub fn synthetic_config(&self) -> Result<SyntheticConfig, ScenarioError> {
        let currency = self.currency()?;

        Ok(SyntheticConfig {
            customers: self.customers,
            cltv_min: parse_money(&self.cltv.min, currency)?,
            cltv_max: parse_money(&self.cltv.max, currency)?,
            coupons: self.coupon_set()?,
            seed: self.seed,
        })
    }

    /// Generate the scenario's dataset.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the scenario is invalid.
    pub fn dataset(&self) -> Result<Dataset, ScenarioError> {
        Ok(generate(&self.synthetic_config()?)?)
    }

    /// BAU policy for the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidPercentage`] if the rate cannot be parsed.
    pub fn baseline_policy(&self) -> Result<BaselinePolicy, ScenarioError> {
        Ok(BaselinePolicy::new(parse_percentage(&self.baseline_rate)?))
    }

    /// Parsed budget setting.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the budget is neither `bau` nor a valid price.
    pub fn budget(&self) -> Result<Budget, ScenarioError> {
        parse_budget(&self.budget, self.currency()?)
    }

    /// Solve constraints for the optimised policy.
    ///
    /// A `bau` budget resolves to the baseline plan's issued face value, or its
    /// expected cost rounded up when the budget limits expected cost.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the budget cannot be resolved.
    pub fn resolve_budget(
        &self,
        baseline: &AssignmentPlan,
    ) -> Result<SolveConstraints, ScenarioError> {
        let budget = match self.budget()? {
            Budget::Fixed(budget) => budget,
            Budget::Bau => match self.budget_basis {
                BudgetBasis::FaceValue => baseline.issued_face_value()?,
                BudgetBasis::ExpectedCost => {
                    to_money(baseline.expected_cost().ceil(), baseline.currency())?
                }
            },
        };

        Ok(SolveConstraints {
            budget,
            basis: self.budget_basis,
        })
    }
}

/// Build a coupon set from scenario entries.
///
/// # Errors
///
/// Returns a [`ScenarioError`] if a price is invalid or the set is rejected.
pub fn coupon_set(
    entries: &[CouponEntry],
    currency: &'static Currency,
) -> Result<CouponSet, ScenarioError> {
    let coupons = entries
        .iter()
        .map(|entry| entry.to_coupon(currency))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CouponSet::new(coupons, currency)?)
}

/// Parse a budget setting: `bau` or a price.
///
/// # Errors
///
/// Returns a [`ScenarioError`] if the value is neither `bau` nor a valid price in
/// `currency`.
pub fn parse_budget(s: &str, currency: &'static Currency) -> Result<Budget, ScenarioError> {
    if s.trim().eq_ignore_ascii_case(BAU_BUDGET) {
        return Ok(Budget::Bau);
    }

    Ok(Budget::Fixed(parse_money(s, currency)?))
}

/// Parse a currency code.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownCurrency`] for anything other than GBP, USD or EUR.
pub fn parse_currency(code: &str) -> Result<&'static Currency, ScenarioError> {
    match code.trim() {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(ScenarioError::UnknownCurrency(other.to_string())),
    }
}

/// Parse price string (e.g., "2.99 GBP") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), ScenarioError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, currency_code] = parts.as_slice() else {
        return Err(ScenarioError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let amount = amount
        .parse::<Decimal>()
        .map_err(|_err| ScenarioError::InvalidPrice(s.to_string()))?;

    let minor_units = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| ScenarioError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, parse_currency(currency_code)?))
}

/// Parse a price that must be in `currency`.
///
/// # Errors
///
/// Returns a [`ScenarioError`] if the price is invalid or in another currency.
pub fn parse_money(
    s: &str,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, ScenarioError> {
    let (minor_units, found) = parse_price(s)?;

    if found != currency {
        return Err(ScenarioError::CurrencyMismatch(
            currency.iso_alpha_code.to_string(),
            found.iso_alpha_code.to_string(),
        ));
    }

    Ok(Money::from_minor(minor_units, currency))
}

/// Format money as "AMOUNT CURRENCY", the inverse of [`parse_price`].
pub fn format_price(money: &Money<'static, Currency>) -> String {
    format!(
        "{} {}",
        Decimal::new(money.to_minor_units(), 2),
        money.currency().iso_alpha_code
    )
}

/// Parse percentage string (e.g., "15%" or "0.15") into a `Percentage`
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Decimal format: "0.15" for 15%
///
/// # Errors
///
/// Returns an error if the string cannot be parsed or is negative.
pub fn parse_percentage(s: &str) -> Result<Percentage, ScenarioError> {
    let trimmed = s.trim();

    let value = if let Some(percent_str) = trimmed.strip_suffix('%') {
        percent_str
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| ScenarioError::InvalidPercentage(s.to_string()))?
            .checked_div(Decimal::ONE_HUNDRED)
            .ok_or_else(|| ScenarioError::InvalidPercentage(s.to_string()))?
    } else {
        trimmed
            .parse::<Decimal>()
            .map_err(|_err| ScenarioError::InvalidPercentage(s.to_string()))?
    };

    if value.is_sign_negative() {
        return Err(ScenarioError::InvalidPercentage(s.to_string()));
    }

    Ok(Percentage::from(value))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const SCENARIO: &str = r#"
currency: USD
seed: 7
customers: 25
cltv: { min: "50.00 USD", max: "1500.00 USD" }
coupons:
  - "0.00 USD"
  - { value: "5.00 USD" }
  - { value: "50.00 USD", limit: 3 }
baseline_rate: "10%"
budget: bau
budget_basis: expected_cost
"#;

    #[test]
    fn parses_full_scenario() -> TestResult {
        let scenario: Scenario = SCENARIO.parse()?;

        assert_eq!(scenario.seed, 7);
        assert_eq!(scenario.customers, 25);
        assert_eq!(scenario.budget_basis, BudgetBasis::ExpectedCost);
        assert_eq!(scenario.budget()?, Budget::Bau);

        let coupons = scenario.coupon_set()?;

        assert_eq!(coupons.len(), 3);
        assert_eq!(coupons.get(2)?.limit, Some(3));
        assert_eq!(coupons.get(1)?.minor_units(), 500);

        Ok(())
    }

    #[test]
    fn optional_fields_have_defaults() -> TestResult {
        let scenario: Scenario = r#"
currency: GBP
customers: 3
cltv: { min: "1.00 GBP", max: "2.00 GBP" }
coupons: ["0.00 GBP"]
"#
        .parse()?;

        assert_eq!(scenario.seed, 42);
        assert_eq!(scenario.budget()?, Budget::Bau);
        assert_eq!(scenario.budget_basis, BudgetBasis::FaceValue);
        assert_eq!(
            scenario.baseline_policy()?.rate,
            BaselinePolicy::default().rate
        );

        Ok(())
    }

    #[test]
    fn dataset_is_reproducible() -> TestResult {
        let scenario: Scenario = SCENARIO.parse()?;

        let a = scenario.dataset()?;
        let b = scenario.dataset()?;

        assert_eq!(a.population().len(), 25);
        assert_eq!(a.acceptance(), b.acceptance());

        Ok(())
    }

    #[test]
    fn bau_budget_resolves_to_baseline_spend() -> TestResult {
        let mut scenario: Scenario = SCENARIO.parse()?;
        scenario.budget_basis = BudgetBasis::FaceValue;

        let dataset = scenario.dataset()?;
        let baseline = scenario.baseline_policy()?.assign(&dataset)?;

        let constraints = scenario.resolve_budget(&baseline)?;

        assert_eq!(constraints.budget, baseline.issued_face_value()?);
        assert_eq!(constraints.basis, BudgetBasis::FaceValue);

        Ok(())
    }

    #[test]
    fn bau_expected_cost_budget_rounds_up() -> TestResult {
        let scenario: Scenario = SCENARIO.parse()?;

        let dataset = scenario.dataset()?;
        let baseline = scenario.baseline_policy()?.assign(&dataset)?;

        let constraints = scenario.resolve_budget(&baseline)?;

        assert!(Decimal::from(constraints.budget.to_minor_units()) >= baseline.expected_cost());
        assert_eq!(constraints.basis, BudgetBasis::ExpectedCost);

        Ok(())
    }

    #[test]
    fn fixed_budget_is_parsed() -> TestResult {
        assert_eq!(
            parse_budget("25.00 USD", USD)?,
            Budget::Fixed(Money::from_minor(2_500, USD))
        );
        assert_eq!(parse_budget(" BAU ", USD)?, Budget::Bau);

        Ok(())
    }

    #[test]
    fn parse_price_rejects_invalid_format() {
        let result = parse_price("2.99USD");

        assert!(matches!(result, Err(ScenarioError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(ScenarioError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_money_rejects_other_currency() {
        let result = parse_money("2.99 GBP", USD);

        assert!(matches!(
            result,
            Err(ScenarioError::CurrencyMismatch(expected, found)) if expected == "USD" && found == "GBP"
        ));
    }

    #[test]
    fn format_price_round_trips() -> TestResult {
        let money = Money::from_minor(150_005, EUR);

        assert_eq!(format_price(&money), "1500.05 EUR");
        assert_eq!(parse_money(&format_price(&money), EUR)?, money);

        Ok(())
    }

    #[test]
    fn parse_percentage_accepts_both_formats() -> TestResult {
        assert_eq!(parse_percentage("15%")?, Percentage::from(Decimal::new(15, 2)));
        assert_eq!(parse_percentage("0.15")?, Percentage::from(Decimal::new(15, 2)));
        assert!(matches!(
            parse_percentage("-5%"),
            Err(ScenarioError::InvalidPercentage(_))
        ));
        assert!(matches!(
            parse_percentage("ten"),
            Err(ScenarioError::InvalidPercentage(_))
        ));

        Ok(())
    }
}
