use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::validation::{Discrepancy, Tolerance};

/// Tax line of a customer invoice.
///
/// Holds the net, tax and surcharge totals for one tax code on one invoice.
/// `line_total` must equal `net_amount + tax_amount + surcharge_amount`
/// within the configured [`Tolerance`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTaxLine {
    /// Primary key; `None` until the line has been inserted.
    pub id: Option<i64>,
    pub invoice_id: Option<i64>,
    pub tax_code: Option<String>,

    /// Taxable base for this tax code.
    pub net_amount: Decimal,
    /// Tax percentage (21 means 21%).
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    /// Equivalence surcharge percentage.
    pub surcharge_rate: Decimal,
    pub surcharge_amount: Decimal,

    pub line_total: Decimal,
}

impl InvoiceTaxLine {
    /// An empty, unsaved line with zeroed amounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unsaved line for `invoice_id`, deriving the tax and surcharge
    /// totals from the net amount and their percentages.
    ///
    /// Fails with [`Discrepancy::Overflow`] when a derived amount does not
    /// fit in a [`Decimal`].
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use invoice_core::InvoiceTaxLine;
    ///
    /// let line = InvoiceTaxLine::for_invoice(5, "IVA21", dec!(100), dec!(21), dec!(5.2)).unwrap();
    ///
    /// assert_eq!(line.tax_amount, dec!(21));
    /// assert_eq!(line.surcharge_amount, dec!(5.2));
    /// assert_eq!(line.line_total, dec!(126.2));
    /// ```
    pub fn for_invoice(
        invoice_id: i64,
        tax_code: impl Into<String>,
        net_amount: Decimal,
        tax_rate: Decimal,
        surcharge_rate: Decimal,
    ) -> Result<Self, Discrepancy> {
        let tax_code = tax_code.into();
        let percentage = |rate: Decimal| {
            net_amount
                .checked_mul(rate)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        };
        let overflow = || Discrepancy::Overflow {
            tax_code: Some(tax_code.clone()),
        };

        let tax_amount = percentage(tax_rate).ok_or_else(overflow)?;
        let surcharge_amount = percentage(surcharge_rate).ok_or_else(overflow)?;

        let mut line = Self {
            id: None,
            invoice_id: Some(invoice_id),
            tax_code: Some(tax_code),
            net_amount,
            tax_rate,
            tax_amount,
            surcharge_rate,
            surcharge_amount,
            line_total: Decimal::ZERO,
        };
        line.recalculate_total()?;
        Ok(line)
    }

    /// `net_amount + tax_amount + surcharge_amount`, or `None` when the sum
    /// does not fit in a [`Decimal`].
    pub fn expected_line_total(&self) -> Option<Decimal> {
        self.net_amount
            .checked_add(self.tax_amount)?
            .checked_add(self.surcharge_amount)
    }

    /// Overwrite `line_total` with [`Self::expected_line_total`]. On overflow
    /// the line is left untouched.
    pub fn recalculate_total(&mut self) -> Result<(), Discrepancy> {
        let total = self.expected_line_total().ok_or_else(|| self.overflow())?;
        self.line_total = total;
        Ok(())
    }

    /// Check that `line_total` reconciles with its three components.
    ///
    /// On mismatch the returned [`Discrepancy::LineTotal`] carries the tax
    /// code and the correct total rounded to the tolerance precision.
    pub fn check_line_total(
        &self,
        tolerance: &Tolerance,
    ) -> Result<(), Discrepancy> {
        let expected = self.expected_line_total().ok_or_else(|| self.overflow())?;
        if tolerance.matches(self.line_total, expected) {
            return Ok(());
        }

        Err(Discrepancy::LineTotal {
            tax_code: self.tax_code.clone(),
            expected: tolerance.round(expected),
            actual: self.line_total,
        })
    }

    fn overflow(&self) -> Discrepancy {
        Discrepancy::Overflow {
            tax_code: self.tax_code.clone(),
        }
    }
}
