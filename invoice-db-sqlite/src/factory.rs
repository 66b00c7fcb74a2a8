use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use invoice_core::db::repository::{InvoiceTaxLineRepository, RepositoryError};
use invoice_core::db::{DbConfig, RepositoryFactory};

use crate::repository::SqliteRepository;

/// Set this to a directory of `.sql` files to have them applied every time
/// the factory opens a store.
pub const SEEDS_DIR_ENV: &str = "INVOICE_DB_SQLITE_SEEDS_DIR";

fn seeds_dir() -> Option<PathBuf> {
    std::env::var_os(SEEDS_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`invoice_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use invoice_core::db::RepositoryRegistry;
/// use invoice_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.connection_string` and bring
    /// its schema up to date.
    ///
    /// Accepted connection-string values:
    /// * A bare file path, e.g. `"invoices.db"`. The file is created if it
    ///   does not exist.
    /// * A sqlx URL such as `"sqlite://invoices.db"`.
    /// * `":memory:"` for an ephemeral in-memory database.
    ///
    /// Seed files are applied only when `INVOICE_DB_SQLITE_SEEDS_DIR` is set.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn InvoiceTaxLineRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        if let Some(dir) = seeds_dir() {
            info!(dir = %dir.display(), "loading seed files");
            repo.run_seeds(&dir)
                .await
                .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        }

        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use invoice_core::InvoiceTaxLine;
    use invoice_core::db::DbConfig;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::SqliteRepositoryFactory;
    use invoice_core::db::RepositoryFactory;

    fn config(connection_string: &str) -> DbConfig {
        DbConfig {
            backend: "sqlite".to_string(),
            connection_string: connection_string.to_string(),
        }
    }

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    /// Full round-trip: factory, migrations, then a save and a listing.
    #[tokio::test]
    async fn creates_usable_in_memory_repository() {
        let repo = match SqliteRepositoryFactory.create(&config(":memory:")).await {
            Ok(repo) => repo,
            Err(e) => panic!("failed to create in-memory repository: {e:#?}"),
        };

        let mut line = InvoiceTaxLine::for_invoice(9, "IVA21", dec!(10), dec!(21), dec!(0))
            .expect("amounts fit");
        repo.save(&mut line).await.expect("Should save line");

        let lines = repo.list_by_invoice(9).await.expect("Should list lines");
        assert_eq!(lines, vec![line]);
    }

    #[tokio::test]
    async fn unreachable_database_is_a_connection_error() {
        let result = SqliteRepositoryFactory
            .create(&config("/nonexistent-dir/for-sure/invoices.db"))
            .await;

        assert!(
            matches!(result, Err(invoice_core::RepositoryError::Connection(_))),
            "expected a connection error"
        );
    }
}
