pub mod db;
pub mod models;
pub mod validation;

pub use db::repository::{InvoiceTaxLineRepository, RepositoryError, SaveOutcome};
pub use models::*;
pub use validation::{Discrepancy, InvoiceTotals, Tolerance, ValidationReport};
