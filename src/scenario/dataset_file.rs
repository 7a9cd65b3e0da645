//! Dataset Files
//!
//! A generated dataset written out as YAML so it can be inspected, edited or solved
//! again without regenerating it.

use std::{fs, path::Path};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    acceptance::{AcceptanceMatrix, Probability},
    customers::{Customer, Population},
    dataset::Dataset,
    scenario::{
        CouponEntry, ScenarioError, coupon_set, format_price, parse_currency, parse_money,
    },
};

/// A customer with their acceptance probability for every coupon.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomerRecord {
    /// Customer name
    pub name: String,

    /// Lifetime value (e.g., "123.45 USD")
    pub cltv: String,

    /// Acceptance probabilities, one per coupon in ascending face value order
    pub acceptance: Vec<String>,
}

/// Dataset file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetFile {
    /// Currency code
    pub currency: String,

    /// Candidate coupons
    pub coupons: Vec<CouponEntry>,

    /// Customers
    pub customers: Vec<CustomerRecord>,
}

impl DatasetFile {
    /// Capture a dataset.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let coupons = dataset
            .coupons()
            .iter()
            .map(|coupon| match coupon.limit {
                Some(limit) => CouponEntry::Detailed {
                    value: format_price(&coupon.face_value),
                    limit: Some(limit),
                },
                None => CouponEntry::Value(format_price(&coupon.face_value)),
            })
            .collect();

        let customers = dataset
            .population()
            .iter()
            .zip(dataset.acceptance().rows())
            .map(|(customer, row)| CustomerRecord {
                name: customer.name.clone(),
                cltv: format_price(&customer.cltv),
                acceptance: row.iter().map(ToString::to_string).collect(),
            })
            .collect();

        DatasetFile {
            currency: dataset.currency().iso_alpha_code.to_string(),
            coupons,
            customers,
        }
    }

    /// Rebuild the dataset.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if any value is invalid or the rows do not match the
    /// coupon set.
    pub fn to_dataset(&self) -> Result<Dataset, ScenarioError> {
        let currency = parse_currency(&self.currency)?;

        let coupons = coupon_set(&self.coupons, currency)?;

        let mut customers = Vec::with_capacity(self.customers.len());
        let mut rows = Vec::with_capacity(self.customers.len());

        for record in &self.customers {
            customers.push(Customer::new(
                record.name.clone(),
                parse_money(&record.cltv, currency)?,
            ));

            rows.push(
                record
                    .acceptance
                    .iter()
                    .map(String::as_str)
                    .map(parse_probability)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }

        let population = Population::with_customers(customers, currency)?;
        let acceptance = AcceptanceMatrix::new(rows, coupons.len())?;

        Ok(Dataset::new(population, coupons, acceptance)?)
    }

    /// Load a dataset file.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;

        Ok(serde_norway::from_str(&contents)?)
    }

    /// Write the dataset file.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] if the file cannot be serialised or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let contents = serde_norway::to_string(self)?;

        fs::write(path, contents)?;

        Ok(())
    }
}

fn parse_probability(s: &str) -> Result<Probability, ScenarioError> {
    let value = s
        .trim()
        .parse::<Decimal>()
        .map_err(|_err| ScenarioError::InvalidProbability(s.to_string()))?;

    Ok(Probability::new(value)?)
}
