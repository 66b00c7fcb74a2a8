use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::models::InvoiceTaxLine;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Record has no primary key (it was never saved)")]
    MissingId,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// What [`InvoiceTaxLineRepository::save`] did with the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new row was written; carries the generated primary key.
    Inserted(i64),
    Updated,
}

/// Storage for invoice tax lines, one row per line.
///
/// Backends implement the row-level methods; `exists`, `save` and `delete`
/// are built on top of them.
#[async_trait]
pub trait InvoiceTaxLineRepository: Send + Sync {
    /// Load one line by primary key.
    async fn get_line(&self, id: i64) -> Result<InvoiceTaxLine, RepositoryError>;

    /// Insert `line` as a new row and return the generated primary key.
    /// `line.id` is ignored.
    async fn insert_line(&self, line: &InvoiceTaxLine) -> Result<i64, RepositoryError>;

    /// Overwrite every column of the row keyed by `line.id`.
    async fn update_line(&self, line: &InvoiceTaxLine) -> Result<(), RepositoryError>;

    /// Delete one row; [`RepositoryError::NotFound`] when no row matched.
    async fn delete_line(&self, id: i64) -> Result<(), RepositoryError>;

    /// Remove every line of one invoice, returning how many rows went away.
    async fn delete_by_invoice(&self, invoice_id: i64) -> Result<u64, RepositoryError>;

    /// All lines of one invoice, highest tax rate first.
    async fn list_by_invoice(
        &self,
        invoice_id: i64,
    ) -> Result<Vec<InvoiceTaxLine>, RepositoryError>;

    /// Whether `line` is already stored.
    ///
    /// A line without an invoice is never considered stored, and neither is
    /// one without a primary key. Otherwise the full row is fetched by id.
    async fn exists(&self, line: &InvoiceTaxLine) -> Result<bool, RepositoryError> {
        if line.invoice_id.is_none() {
            return Ok(false);
        }
        let Some(id) = line.id else {
            return Ok(false);
        };

        match self.get_line(id).await {
            Ok(_) => Ok(true),
            Err(RepositoryError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Update the line when it [exists](Self::exists), insert it otherwise.
    /// After an insert the generated key is written back to `line.id`.
    async fn save(&self, line: &mut InvoiceTaxLine) -> Result<SaveOutcome, RepositoryError> {
        if self.exists(line).await? {
            self.update_line(line).await?;
            debug!(id = line.id, invoice_id = line.invoice_id, "updated tax line");
            return Ok(SaveOutcome::Updated);
        }

        let id = self.insert_line(line).await?;
        line.id = Some(id);
        debug!(id, invoice_id = line.invoice_id, "inserted tax line");
        Ok(SaveOutcome::Inserted(id))
    }

    /// Remove the row backing `line`.
    ///
    /// Deleting a row that is already gone is an error
    /// ([`RepositoryError::NotFound`]), not a silent success.
    async fn delete(&self, line: &InvoiceTaxLine) -> Result<(), RepositoryError> {
        let id = line.id.ok_or(RepositoryError::MissingId)?;
        self.delete_line(id).await?;
        debug!(id, "deleted tax line");
        Ok(())
    }
}
