use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use invoice_core::{InvoiceTaxLine, InvoiceTaxLineRepository, RepositoryError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::columns::{decimal_to_f64, get_decimal, get_optional_id, get_optional_text};

const SELECT_COLUMNS: &str = "SELECT idlinea, idfactura, neto, codimpuesto, iva, totaliva,
        recargo, totalrecargo, totallinea
 FROM lineasivafactcli";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open `database_url`, creating the file when it does not exist.
    ///
    /// Accepts sqlx URLs (`sqlite://invoices.db`, `sqlite::memory:`) as well
    /// as bare paths and `:memory:`.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            debug!(file = %path.display(), "applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_tax_line(row: &SqliteRow) -> Result<InvoiceTaxLine, RepositoryError> {
    Ok(InvoiceTaxLine {
        id: Some(
            row.try_get("idlinea")
                .map_err(|e| RepositoryError::Database(e.to_string()))?,
        ),
        invoice_id: get_optional_id(row, "idfactura")?,
        tax_code: get_optional_text(row, "codimpuesto")?,
        net_amount: get_decimal(row, "neto")?,
        tax_rate: get_decimal(row, "iva")?,
        tax_amount: get_decimal(row, "totaliva")?,
        surcharge_rate: get_decimal(row, "recargo")?,
        surcharge_amount: get_decimal(row, "totalrecargo")?,
        line_total: get_decimal(row, "totallinea")?,
    })
}

#[async_trait]
impl InvoiceTaxLineRepository for SqliteRepository {
    async fn get_line(
        &self,
        id: i64,
    ) -> Result<InvoiceTaxLine, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE idlinea = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?
            .ok_or(RepositoryError::NotFound)?;

        row_to_tax_line(&row)
    }

    async fn insert_line(
        &self,
        line: &InvoiceTaxLine,
    ) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO lineasivafactcli (
                idfactura, neto, codimpuesto, iva, totaliva,
                recargo, totalrecargo, totallinea
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(line.invoice_id)
        .bind(decimal_to_f64(line.net_amount))
        .bind(line.tax_code.as_deref())
        .bind(decimal_to_f64(line.tax_rate))
        .bind(decimal_to_f64(line.tax_amount))
        .bind(decimal_to_f64(line.surcharge_rate))
        .bind(decimal_to_f64(line.surcharge_amount))
        .bind(decimal_to_f64(line.line_total))
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn update_line(
        &self,
        line: &InvoiceTaxLine,
    ) -> Result<(), RepositoryError> {
        let id = line.id.ok_or(RepositoryError::MissingId)?;

        let result = sqlx::query(
            "UPDATE lineasivafactcli SET
                idfactura = ?, neto = ?, codimpuesto = ?, iva = ?, totaliva = ?,
                recargo = ?, totalrecargo = ?, totallinea = ?
             WHERE idlinea = ?",
        )
        .bind(line.invoice_id)
        .bind(decimal_to_f64(line.net_amount))
        .bind(line.tax_code.as_deref())
        .bind(decimal_to_f64(line.tax_rate))
        .bind(decimal_to_f64(line.tax_amount))
        .bind(decimal_to_f64(line.surcharge_rate))
        .bind(decimal_to_f64(line.surcharge_amount))
        .bind(decimal_to_f64(line.line_total))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_line(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM lineasivafactcli WHERE idlinea = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_by_invoice(
        &self,
        invoice_id: i64,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM lineasivafactcli WHERE idfactura = ?")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_by_invoice(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<InvoiceTaxLine>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE idfactura = ? ORDER BY iva DESC, idlinea ASC",
            SELECT_COLUMNS
        ))
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_tax_line).collect()
    }
}
