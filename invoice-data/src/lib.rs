pub mod loader;

use invoice_core::db::RepositoryRegistry;
use invoice_db_sqlite::SqliteRepositoryFactory;

pub use loader::{TaxLineLoader, TaxLineLoaderError};

/// Registry with every backend this build ships.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}
