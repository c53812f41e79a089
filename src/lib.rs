//! Resource regression harness for the repository packer.
//!
//! A [`harness::PackRun`] runs the packer once and yields a
//! [`schema::PackResult`]; [`compare::evaluate`] gates a candidate result
//! against a reference under a percentage allowance, and [`export`] archives
//! results as CSV series.

pub mod compare;
pub mod error;
pub mod export;
pub mod harness;
pub mod inventory;
pub mod runner;
pub mod schema;
pub mod units;

pub use error::{BenchError, Result};
