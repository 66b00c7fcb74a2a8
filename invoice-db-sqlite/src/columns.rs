//! Typed column readers for `lineasivafactcli` rows.
//!
//! SQLite stores whatever storage class a value arrived with, and older
//! rows of this table may hold amounts as INTEGER, REAL or even TEXT. These
//! helpers accept all of them and map NULL to the empty-line defaults.

use std::str::FromStr;

use invoice_core::RepositoryError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

fn column_not_found(
    column: &str,
    e: sqlx::Error,
) -> RepositoryError {
    RepositoryError::Database(format!("Column '{}' not found: {}", column, e))
}

fn storage_class(
    row: &SqliteRow,
    column: &str,
) -> Result<String, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| column_not_found(column, e))?;

    if value_ref.is_null() {
        return Ok("NULL".to_string());
    }
    Ok(value_ref.type_info().name().to_string())
}

/// Read an amount, accepting INTEGER, REAL and numeric TEXT. NULL and blank
/// text read as zero.
pub fn get_decimal(
    row: &SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    match storage_class(row, column)?.as_str() {
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!(
                    "Failed to get INTEGER from '{}': {}",
                    column, e
                ))
            })?;
            Ok(Decimal::from(val))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get REAL from '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map_err(|e| {
                RepositoryError::Database(format!("Failed to convert {} to Decimal: {}", val, e))
            })
        }
        "TEXT" => {
            let val: String = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to get TEXT from '{}': {}", column, e))
            })?;
            let trimmed = val.trim();
            if trimmed.is_empty() {
                return Ok(Decimal::ZERO);
            }
            Decimal::from_str(trimmed).map_err(|_| {
                RepositoryError::Database(format!(
                    "Column '{}' holds non-numeric text '{}'",
                    column, val
                ))
            })
        }
        "NULL" => Ok(Decimal::ZERO),
        other => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            other, column
        ))),
    }
}

/// Read a nullable integer key.
pub fn get_optional_id(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<i64>, RepositoryError> {
    row.try_get::<Option<i64>, _>(column).map_err(|e| {
        RepositoryError::Database(format!("Failed to get INTEGER from '{}': {}", column, e))
    })
}

/// Read nullable text; empty strings read as `None`.
pub fn get_optional_text(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    let val = row.try_get::<Option<String>, _>(column).map_err(|e| {
        RepositoryError::Database(format!("Failed to get TEXT from '{}': {}", column, e))
    })?;
    Ok(val.filter(|v| !v.is_empty()))
}

/// Convert a Decimal to f64 for SQLite storage.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
