//! Database layer: credentials, session lifecycle, execution, catalog.

pub mod cache;
pub mod catalog;
pub mod credentials;
pub mod executor;
pub mod probe;
pub mod types;

pub use cache::{CacheOptions, ConnectionCache, PgConnectionCache, SharedSession};
pub use catalog::CatalogInspector;
pub use credentials::{CredentialResolver, Credentials};
pub use executor::QueryExecutor;
pub use probe::WarehouseSession;
