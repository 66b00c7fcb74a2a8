//! Arithmetic consistency checks for invoice tax lines.
//!
//! Mismatches are reported as [`Discrepancy`] values collected in a
//! [`ValidationReport`]; they are never errors.

pub mod invoice_totals;
pub mod report;
pub mod tolerance;

pub use invoice_totals::{InvoiceTotals, check_invoice, validate_invoice_totals};
pub use report::{Discrepancy, ValidationReport};
pub use tolerance::{DEFAULT_PRECISION, Tolerance};
