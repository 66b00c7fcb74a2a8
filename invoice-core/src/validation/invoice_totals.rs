use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Discrepancy, Tolerance, ValidationReport};
use crate::db::repository::{InvoiceTaxLineRepository, RepositoryError};
use crate::models::InvoiceTaxLine;

/// Net, tax and surcharge totals of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub net: Decimal,
    pub tax: Decimal,
    pub surcharge: Decimal,
}

impl InvoiceTotals {
    pub fn new(
        net: Decimal,
        tax: Decimal,
        surcharge: Decimal,
    ) -> Self {
        Self {
            net,
            tax,
            surcharge,
        }
    }
}

/// Reconcile an invoice's tax lines with the totals stored on the invoice.
///
/// Every line is checked with [`InvoiceTaxLine::check_line_total`] first;
/// a failing line is reported and the run continues. The line amounts are
/// then summed and each sum compared with `expected`. All three sums are
/// checked, so one report can carry a net, a tax and a surcharge mismatch
/// at the same time.
///
/// `due_ratio` is the share of the invoice that is actually due (1 when
/// there is no global discount). Tax is computed and stored per line, not
/// over the discounted taxable bases, so the discount is applied to the
/// summed tax and surcharge amounts directly. Recomputing them from a
/// rounded discounted base instead would lose precision on every line and
/// the difference would grow with the number of lines.
///
/// A line or sum whose arithmetic overflows is reported as a
/// [`Discrepancy::Overflow`] or [`Discrepancy::SumOverflow`].
pub fn validate_invoice_totals(
    lines: &[InvoiceTaxLine],
    expected: &InvoiceTotals,
    due_ratio: Decimal,
    tolerance: &Tolerance,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut net = Some(Decimal::ZERO);
    let mut tax = Some(Decimal::ZERO);
    let mut surcharge = Some(Decimal::ZERO);

    for line in lines {
        if let Err(discrepancy) = line.check_line_total(tolerance) {
            report.push(discrepancy);
        }

        net = net.and_then(|sum| sum.checked_add(line.net_amount));
        tax = tax.and_then(|sum| {
            sum.checked_add(line.tax_amount.checked_mul(due_ratio)?)
        });
        surcharge = surcharge.and_then(|sum| {
            sum.checked_add(line.surcharge_amount.checked_mul(due_ratio)?)
        });
    }

    compare_sum(&mut report, tolerance, "net", expected.net, net, |expected, actual| {
        Discrepancy::NetSum { expected, actual }
    });
    compare_sum(&mut report, tolerance, "tax", expected.tax, tax, |expected, actual| {
        Discrepancy::TaxSum { expected, actual }
    });
    compare_sum(
        &mut report,
        tolerance,
        "surcharge",
        expected.surcharge,
        surcharge,
        |expected, actual| Discrepancy::SurchargeSum { expected, actual },
    );

    report
}

/// `actual` is `None` when the sum overflowed.
fn compare_sum(
    report: &mut ValidationReport,
    tolerance: &Tolerance,
    sum: &'static str,
    expected: Decimal,
    actual: Option<Decimal>,
    mismatch: impl FnOnce(Decimal, Decimal) -> Discrepancy,
) {
    match actual {
        None => report.push(Discrepancy::SumOverflow { sum }),
        Some(actual) if !tolerance.matches(expected, actual) => {
            report.push(mismatch(expected, actual))
        }
        Some(_) => {}
    }
}

/// Load every tax line of `invoice_id` and run [`validate_invoice_totals`]
/// over them.
///
/// # Errors
/// Any [`RepositoryError`] raised while fetching the lines.
pub async fn check_invoice<R>(
    repo: &R,
    invoice_id: i64,
    expected: &InvoiceTotals,
    due_ratio: Decimal,
    tolerance: &Tolerance,
) -> Result<ValidationReport, RepositoryError>
where
    R: InvoiceTaxLineRepository + ?Sized,
{
    let lines = repo.list_by_invoice(invoice_id).await?;
    debug!(invoice_id, lines = lines.len(), "validating invoice tax lines");

    Ok(validate_invoice_totals(&lines, expected, due_ratio, tolerance))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    /// Answers `list_by_invoice` with a fixed set of lines.
    struct StoredLines(Vec<InvoiceTaxLine>);

    /// Fails every read, as a locked or unreachable store would.
    struct FailingRepository;

    #[async_trait]
    impl InvoiceTaxLineRepository for StoredLines {
        async fn get_line(&self, _id: i64) -> Result<InvoiceTaxLine, RepositoryError> {
            unimplemented!()
        }
        async fn insert_line(&self, _line: &InvoiceTaxLine) -> Result<i64, RepositoryError> {
            unimplemented!()
        }
        async fn update_line(&self, _line: &InvoiceTaxLine) -> Result<(), RepositoryError> {
            unimplemented!()
        }
        async fn delete_line(&self, _id: i64) -> Result<(), RepositoryError> {
            unimplemented!()
        }
        async fn delete_by_invoice(&self, _invoice_id: i64) -> Result<u64, RepositoryError> {
            unimplemented!()
        }
        async fn list_by_invoice(
            &self,
            _invoice_id: i64,
        ) -> Result<Vec<InvoiceTaxLine>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    #[async_trait]
    impl InvoiceTaxLineRepository for FailingRepository {
        async fn get_line(&self, _id: i64) -> Result<InvoiceTaxLine, RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
        async fn insert_line(&self, _line: &InvoiceTaxLine) -> Result<i64, RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
        async fn update_line(&self, _line: &InvoiceTaxLine) -> Result<(), RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
        async fn delete_line(&self, _id: i64) -> Result<(), RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
        async fn delete_by_invoice(&self, _invoice_id: i64) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
        async fn list_by_invoice(
            &self,
            _invoice_id: i64,
        ) -> Result<Vec<InvoiceTaxLine>, RepositoryError> {
            Err(RepositoryError::Database("database is locked".to_string()))
        }
    }

    fn line(
        tax_code: &str,
        net: Decimal,
        tax: Decimal,
        surcharge: Decimal,
    ) -> InvoiceTaxLine {
        InvoiceTaxLine {
            id: None,
            invoice_id: Some(5),
            tax_code: Some(tax_code.to_string()),
            net_amount: net,
            tax_rate: Decimal::ZERO,
            tax_amount: tax,
            surcharge_rate: Decimal::ZERO,
            surcharge_amount: surcharge,
            line_total: net + tax + surcharge,
        }
    }

    fn two_lines() -> Vec<InvoiceTaxLine> {
        vec![
            line("IVA21", dec!(100), dec!(21), dec!(0)),
            line("IVA10", dec!(105), dec!(10.5), dec!(0)),
        ]
    }

    #[test]
    fn matching_totals_pass() {
        let expected = InvoiceTotals::new(dec!(205), dec!(31.5), dec!(0));

        let report = validate_invoice_totals(&two_lines(), &expected, dec!(1), &Tolerance::default());

        assert!(report.is_ok(), "unexpected: {report}");
    }

    #[test]
    fn tax_mismatch_is_reported_with_discrepancy() {
        let expected = InvoiceTotals::new(dec!(205), dec!(30), dec!(0));

        let report = validate_invoice_totals(&two_lines(), &expected, dec!(1), &Tolerance::default());

        assert_eq!(
            report.discrepancies(),
            &[Discrepancy::TaxSum {
                expected: dec!(30),
                actual: dec!(31.5),
            }]
        );
        assert!(report.messages()[0].contains("31.5"));
    }

    #[test]
    fn every_sum_mismatch_is_reported() {
        let expected = InvoiceTotals::new(dec!(1), dec!(2), dec!(3));

        let report = validate_invoice_totals(&two_lines(), &expected, dec!(1), &Tolerance::default());

        assert_eq!(report.discrepancies().len(), 3);
        assert!(matches!(report.discrepancies()[0], Discrepancy::NetSum { .. }));
        assert!(matches!(report.discrepancies()[1], Discrepancy::TaxSum { .. }));
        assert!(matches!(
            report.discrepancies()[2],
            Discrepancy::SurchargeSum { .. }
        ));
    }

    #[test]
    fn inconsistent_line_does_not_stop_the_run() {
        let mut lines = two_lines();
        lines[0].line_total = dec!(120);
        let expected = InvoiceTotals::new(dec!(205), dec!(31.5), dec!(1));

        let report = validate_invoice_totals(&lines, &expected, dec!(1), &Tolerance::default());

        assert_eq!(report.discrepancies().len(), 2);
        assert_eq!(
            report.discrepancies()[0],
            Discrepancy::LineTotal {
                tax_code: Some("IVA21".to_string()),
                expected: dec!(121),
                actual: dec!(120),
            }
        );
        assert!(matches!(
            report.discrepancies()[1],
            Discrepancy::SurchargeSum { .. }
        ));
    }

    #[test]
    fn due_ratio_scales_tax_and_surcharge_but_not_net() {
        let lines = vec![
            line("IVA21", dec!(100), dec!(21), dec!(5.2)),
            line("IVA10", dec!(50), dec!(5), dec!(0.7)),
        ];
        let expected = InvoiceTotals::new(dec!(150), dec!(23.40), dec!(5.31));

        let report = validate_invoice_totals(&lines, &expected, dec!(0.9), &Tolerance::default());

        assert!(report.is_ok(), "unexpected: {report}");
    }

    #[test]
    fn no_lines_match_zero_totals() {
        let report = validate_invoice_totals(
            &[],
            &InvoiceTotals::default(),
            dec!(1),
            &Tolerance::default(),
        );

        assert!(report.is_ok());
    }

    #[test]
    fn no_lines_fail_non_zero_totals() {
        let expected = InvoiceTotals::new(dec!(100), dec!(21), dec!(0));

        let report = validate_invoice_totals(&[], &expected, dec!(1), &Tolerance::default());

        assert_eq!(report.discrepancies().len(), 2);
    }

    #[test]
    fn overflowing_due_ratio_is_reported_not_panicked() {
        let lines = vec![line("IVA21", dec!(100), dec!(10000000000), dec!(0))];
        let expected = InvoiceTotals::new(dec!(100), dec!(0), dec!(0));

        let report = validate_invoice_totals(
            &lines,
            &expected,
            dec!(100000000000000000000),
            &Tolerance::default(),
        );

        assert_eq!(
            report.discrepancies(),
            &[Discrepancy::SumOverflow { sum: "tax" }]
        );
    }

    #[test]
    fn overflowing_line_and_net_sum_are_reported() {
        let big = dec!(50000000000000000000000000000);
        let mut lines = vec![
            line("IVA21", big, dec!(0), dec!(0)),
            line("IVA10", big, dec!(0), dec!(0)),
        ];
        lines[1].tax_amount = big;

        let report = validate_invoice_totals(
            &lines,
            &InvoiceTotals::default(),
            dec!(1),
            &Tolerance::default(),
        );

        assert_eq!(
            report.discrepancies(),
            &[
                Discrepancy::Overflow {
                    tax_code: Some("IVA10".to_string()),
                },
                Discrepancy::SumOverflow { sum: "net" },
                Discrepancy::TaxSum {
                    expected: dec!(0),
                    actual: big,
                },
            ]
        );
    }

    #[tokio::test]
    async fn check_invoice_surfaces_store_errors() {
        let result = check_invoice(
            &FailingRepository,
            5,
            &InvoiceTotals::default(),
            dec!(1),
            &Tolerance::default(),
        )
        .await;

        assert_eq!(
            result,
            Err(RepositoryError::Database("database is locked".to_string()))
        );
    }

    #[tokio::test]
    async fn check_invoice_validates_stored_lines() {
        let repo = StoredLines(two_lines());
        let expected = InvoiceTotals::new(dec!(205), dec!(30), dec!(0));

        let report = check_invoice(&repo, 5, &expected, dec!(1), &Tolerance::default())
            .await
            .expect("store is healthy");

        assert_eq!(report.discrepancies().len(), 1);
    }
}
