use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::InvoiceTaxLine;

/// Errors raised while turning untyped field values into an [`InvoiceTaxLine`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HydrationError {
    #[error("Field '{field}' is not a valid integer: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Field '{field}' is not a valid decimal: '{value}'")]
    InvalidDecimal { field: &'static str, value: String },
}

/// Untyped tax line fields, as read from a CSV file or a generic row map.
///
/// Missing or blank fields hydrate to the defaults of
/// [`InvoiceTaxLine::new`]; anything present must parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTaxLine {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub tax_code: Option<String>,
    #[serde(default)]
    pub net_amount: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<String>,
    #[serde(default)]
    pub tax_amount: Option<String>,
    #[serde(default)]
    pub surcharge_rate: Option<String>,
    #[serde(default)]
    pub surcharge_amount: Option<String>,
    #[serde(default)]
    pub line_total: Option<String>,
}

impl RawTaxLine {
    /// Build from a map keyed by the `lineasivafactcli` column names
    /// (`idlinea`, `idfactura`, `neto`, `codimpuesto`, `iva`, `totaliva`,
    /// `recargo`, `totalrecargo`, `totallinea`).
    pub fn from_columns(columns: &HashMap<String, String>) -> Self {
        let get = |name: &str| columns.get(name).cloned();

        Self {
            id: get("idlinea"),
            invoice_id: get("idfactura"),
            tax_code: get("codimpuesto"),
            net_amount: get("neto"),
            tax_rate: get("iva"),
            tax_amount: get("totaliva"),
            surcharge_rate: get("recargo"),
            surcharge_amount: get("totalrecargo"),
            line_total: get("totallinea"),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_integer(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<i64>, HydrationError> {
    present(value)
        .map(|v| {
            v.parse::<i64>().map_err(|_| HydrationError::InvalidInteger {
                field,
                value: v.to_string(),
            })
        })
        .transpose()
}

fn parse_decimal(
    field: &'static str,
    value: &Option<String>,
) -> Result<Decimal, HydrationError> {
    match present(value) {
        None => Ok(Decimal::ZERO),
        Some(v) => Decimal::from_str(v)
            .or_else(|_| Decimal::from_scientific(v))
            .map_err(|_| HydrationError::InvalidDecimal {
                field,
                value: v.to_string(),
            }),
    }
}

impl TryFrom<RawTaxLine> for InvoiceTaxLine {
    type Error = HydrationError;

    fn try_from(raw: RawTaxLine) -> Result<Self, Self::Error> {
        Ok(InvoiceTaxLine {
            id: parse_integer("id", &raw.id)?,
            invoice_id: parse_integer("invoice_id", &raw.invoice_id)?,
            tax_code: present(&raw.tax_code).map(str::to_string),
            net_amount: parse_decimal("net_amount", &raw.net_amount)?,
            tax_rate: parse_decimal("tax_rate", &raw.tax_rate)?,
            tax_amount: parse_decimal("tax_amount", &raw.tax_amount)?,
            surcharge_rate: parse_decimal("surcharge_rate", &raw.surcharge_rate)?,
            surcharge_amount: parse_decimal("surcharge_amount", &raw.surcharge_amount)?,
            line_total: parse_decimal("line_total", &raw.line_total)?,
        })
    }
}
