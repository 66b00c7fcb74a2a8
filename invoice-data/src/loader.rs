use std::collections::BTreeMap;
use std::io::Read;

use invoice_core::{
    Discrepancy, HydrationError, InvoiceTaxLine, InvoiceTaxLineRepository, RawTaxLine,
    RepositoryError, Tolerance,
};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when importing tax lines.
///
/// `row` is the 1-based data row of the CSV file, header excluded.
#[derive(Debug, Error)]
pub enum TaxLineLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Row {row}: {source}")]
    Hydration {
        row: usize,
        #[source]
        source: HydrationError,
    },

    #[error("Row {row}: {discrepancy}")]
    Inconsistent { row: usize, discrepancy: Discrepancy },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TaxLineLoaderError {
    fn from(err: csv::Error) -> Self {
        TaxLineLoaderError::CsvParse(err.to_string())
    }
}

/// Loader for invoice tax lines from CSV files.
///
/// Expected header:
///
/// ```text
/// invoice_id,tax_code,net_amount,tax_rate,tax_amount,surcharge_rate,surcharge_amount,line_total
/// ```
///
/// Values stay untyped until [`TaxLineLoader::load`], so a malformed amount
/// is reported with its row number instead of as a CSV error.
pub struct TaxLineLoader;

impl TaxLineLoader {
    /// Parse tax line records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RawTaxLine>, TaxLineLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: RawTaxLine = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Hydrate `records`, check every line total, then write them.
    ///
    /// Nothing is written unless every record hydrates and reconciles. The
    /// existing lines of each invoice in the file are deleted before its new
    /// lines are inserted, so loading the same file twice leaves the same
    /// rows behind. Lines without an invoice are inserted as they are.
    ///
    /// Returns the number of lines inserted.
    pub async fn load<R>(
        repo: &R,
        records: &[RawTaxLine],
        tolerance: &Tolerance,
    ) -> Result<usize, TaxLineLoaderError>
    where
        R: InvoiceTaxLineRepository + ?Sized,
    {
        let mut by_invoice: BTreeMap<i64, Vec<InvoiceTaxLine>> = BTreeMap::new();
        let mut unassigned = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let row = index + 1;
            let mut line = InvoiceTaxLine::try_from(record.clone())
                .map_err(|source| TaxLineLoaderError::Hydration { row, source })?;
            line.check_line_total(tolerance)
                .map_err(|discrepancy| TaxLineLoaderError::Inconsistent { row, discrepancy })?;

            // Imported lines always get fresh keys.
            line.id = None;
            match line.invoice_id {
                Some(invoice_id) => by_invoice.entry(invoice_id).or_default().push(line),
                None => unassigned.push(line),
            }
        }

        let mut inserted = 0;

        for (invoice_id, lines) in by_invoice {
            let replaced = repo.delete_by_invoice(invoice_id).await?;
            debug!(invoice_id, replaced, new = lines.len(), "replacing invoice tax lines");

            for mut line in lines {
                repo.save(&mut line).await?;
                inserted += 1;
            }
        }

        for mut line in unassigned {
            repo.save(&mut line).await?;
            inserted += 1;
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HEADER: &str =
        "invoice_id,tax_code,net_amount,tax_rate,tax_amount,surcharge_rate,surcharge_amount,line_total";

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    fn raw(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_parse_csv_single_line() {
        let records = TaxLineLoader::parse(csv(&["5,IVA21,100.00,21,21.00,0,0,121.00"]).as_bytes())
            .expect("Failed to parse CSV");

        assert_eq!(
            records,
            vec![RawTaxLine {
                id: None,
                invoice_id: raw("5"),
                tax_code: raw("IVA21"),
                net_amount: raw("100.00"),
                tax_rate: raw("21"),
                tax_amount: raw("21.00"),
                surcharge_rate: raw("0"),
                surcharge_amount: raw("0"),
                line_total: raw("121.00"),
            }]
        );
    }

    #[test]
    fn test_parse_keeps_malformed_values_for_hydration() {
        let records = TaxLineLoader::parse(csv(&["5,IVA21,abc,21,21.00,0,0,121.00"]).as_bytes())
            .expect("Malformed amounts are not a CSV error");

        assert_eq!(records[0].net_amount, raw("abc"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let records =
            TaxLineLoader::parse(csv(&[" 5 , IVA21 ,100,21,21,0,0,121"]).as_bytes()).unwrap();

        assert_eq!(records[0].invoice_id, raw("5"));
        assert_eq!(records[0].tax_code, raw("IVA21"));
    }

    #[test]
    fn test_parse_empty_csv() {
        let records = TaxLineLoader::parse(csv(&[]).as_bytes()).expect("Failed to parse CSV");

        assert!(records.is_empty());
    }

    #[test]
    fn test_parse_ragged_row_is_csv_error() {
        let result = TaxLineLoader::parse(csv(&["5,IVA21,100"]).as_bytes());

        let err = result.expect_err("Should fail for a short row");
        assert!(
            matches!(err, TaxLineLoaderError::CsvParse(_)),
            "Expected CsvParse error, got: {err:?}"
        );
    }

    #[test]
    fn test_hydration_error_message_names_row_and_field() {
        let err = TaxLineLoaderError::Hydration {
            row: 3,
            source: HydrationError::InvalidDecimal {
                field: "net_amount",
                value: "abc".to_string(),
            },
        };

        assert_eq!(
            err.to_string(),
            "Row 3: Field 'net_amount' is not a valid decimal: 'abc'"
        );
    }
}
