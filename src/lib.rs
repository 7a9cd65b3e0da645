//! Coupons
//!
//! Coupon assignment as an integer linear program. Generates a synthetic population of
//! customers, offers each one a coupon under a business-as-usual rule, then finds the
//! assignment that maximises expected return under a budget and compares the two.

pub mod acceptance;
pub mod assignments;
pub mod baseline;
pub mod cli;
pub mod comparison;
pub mod coupons;
pub mod customers;
pub mod dataset;
pub mod logging;
pub mod prelude;
pub mod report;
pub mod returns;
pub mod scenario;
pub mod solvers;
pub mod sweep;
