//! Data models shared across the db layer and the tool surface.

pub mod query;
pub mod schema;

pub use query::{ColumnMetadata, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryMode, QueryOutcome};
pub use schema::{ColumnDescription, TableDescription, TableEntry, split_qualified_name};
