use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

/// One arithmetic inconsistency found by a check.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Discrepancy {
    /// A line's total does not equal net + tax + surcharge.
    #[error(
        "Wrong line total on the invoice tax line for tax code {}. Correct value: {expected}",
        .tax_code.as_deref().unwrap_or("<none>")
    )]
    LineTotal {
        tax_code: Option<String>,
        /// Correct total, rounded to the tolerance precision.
        expected: Decimal,
        actual: Decimal,
    },

    /// The line's amounts do not fit in a decimal once combined.
    #[error(
        "The amounts of the invoice tax line for tax code {} exceed the representable range",
        .tax_code.as_deref().unwrap_or("<none>")
    )]
    Overflow { tax_code: Option<String> },

    /// Summing the lines' `sum` amounts left the representable range.
    #[error("The sum of the tax line {sum} totals exceeds the representable range")]
    SumOverflow { sum: &'static str },

    #[error("The sum of the tax line nets should be {expected} but is {actual}")]
    NetSum { expected: Decimal, actual: Decimal },

    #[error("The sum of the tax line tax totals should be {expected} but is {actual}")]
    TaxSum { expected: Decimal, actual: Decimal },

    #[error("The sum of the tax line surcharge totals should be {expected} but is {actual}")]
    SurchargeSum { expected: Decimal, actual: Decimal },
}

/// Ordered list of discrepancies produced by a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    discrepancies: Vec<Discrepancy>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no discrepancy was recorded.
    pub fn is_ok(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn push(&mut self, discrepancy: Discrepancy) {
        warn!(%discrepancy, "tax line discrepancy");
        self.discrepancies.push(discrepancy);
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    /// Human-readable message for every discrepancy, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.discrepancies.iter().map(ToString::to_string).collect()
    }
}

impl Extend<Discrepancy> for ValidationReport {
    fn extend<I: IntoIterator<Item = Discrepancy>>(&mut self, iter: I) {
        for discrepancy in iter {
            self.push(discrepancy);
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "no discrepancies");
        }
        for (i, discrepancy) in self.discrepancies.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{discrepancy}")?;
        }
        Ok(())
    }
}
