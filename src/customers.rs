//! Customers

use rusty_money::{Money, MoneyError, iso::Currency};
use thiserror::Error;

/// Errors related to population construction or totals.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// A customer's CLTV currency differs from the population currency (index, customer currency, population currency).
    #[error("Customer {0} has currency {1}, but population has currency {2}")]
    CurrencyMismatch(usize, &'static str, &'static str),

    /// A customer has a negative lifetime value.
    #[error("Customer {0} has a negative lifetime value")]
    NegativeCltv(usize),

    /// A customer was not found in the population.
    #[error("Customer {0} not found")]
    CustomerNotFound(usize),

    /// Wrapped money arithmetic error.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Customer
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Customer name or external identifier
    pub name: String,

    /// Customer lifetime value
    pub cltv: Money<'static, Currency>,
}

impl Customer {
    /// Create a new customer.
    pub fn new(name: impl Into<String>, cltv: Money<'static, Currency>) -> Self {
        Customer {
            name: name.into(),
            cltv,
        }
    }
}

/// Population of customers sharing a single currency.
#[derive(Debug, Clone)]
pub struct Population {
    customers: Vec<Customer>,
    currency: &'static Currency,
}

impl Population {
    /// Create an empty population.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Population {
            customers: Vec::new(),
            currency,
        }
    }

    /// Create a population with the given customers.
    ///
    /// # Errors
    ///
    /// Returns a [`PopulationError`] if a customer's CLTV is in a different currency
    /// or is negative.
    pub fn with_customers(
        customers: impl Into<Vec<Customer>>,
        currency: &'static Currency,
    ) -> Result<Self, PopulationError> {
        let customers = customers.into();

        customers.iter().enumerate().try_for_each(|(i, customer)| {
            let customer_currency = customer.cltv.currency();

            if customer_currency != currency {
                return Err(PopulationError::CurrencyMismatch(
                    i,
                    customer_currency.iso_alpha_code,
                    currency.iso_alpha_code,
                ));
            }

            if customer.cltv.to_minor_units() < 0 {
                return Err(PopulationError::NegativeCltv(i));
            }

            Ok(())
        })?;

        Ok(Population {
            customers,
            currency,
        })
    }

    /// Sum of every customer's lifetime value.
    ///
    /// # Errors
    ///
    /// Returns a [`PopulationError::Money`] if the addition fails.
    pub fn total_cltv(&self) -> Result<Money<'static, Currency>, PopulationError> {
        let total = self
            .customers
            .iter()
            .try_fold(Money::from_minor(0, self.currency), |acc, customer| {
                acc.add(customer.cltv)
            })?;

        Ok(total)
    }

    /// Get a customer by index.
    ///
    /// # Errors
    ///
    /// Returns a `PopulationError::CustomerNotFound` if the customer is not found.
    pub fn get_customer(&self, idx: usize) -> Result<&Customer, PopulationError> {
        self.customers
            .get(idx)
            .ok_or(PopulationError::CustomerNotFound(idx))
    }

    /// Iterate over the customers.
    pub fn iter(&self) -> impl Iterator<Item = &Customer> {
        self.customers.iter()
    }

    /// Get the number of customers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.customers.len()
    }

    /// Check if the population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    /// Get the currency of the population.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}
