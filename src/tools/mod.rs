//! Tool handlers for the MCP surface.
//!
//! Every tool takes a caller identity, resolves it through the tenant
//! directory, and operates on that tenant's cached session. Failures are
//! folded into the tool's output envelope so the calling agent branches on
//! `success` instead of handling protocol errors.

pub mod query;
pub mod schema;
pub mod write;

pub use query::QueryToolHandler;
pub use schema::SchemaToolHandler;
pub use write::WriteToolHandler;

use crate::db::{PgConnectionCache, SharedSession};
use crate::error::WarehouseResult;
use crate::tenant::{TenantDirectory, TenantId};
use sqlx::PgConnection;

/// Resolve a caller identity and return the tenant's live session.
pub(crate) async fn session_for_identity(
    directory: &TenantDirectory,
    cache: &PgConnectionCache,
    identity: &str,
) -> WarehouseResult<(TenantId, SharedSession<PgConnection>)> {
    let tenant = directory.resolve(identity)?.clone();
    let session = cache.get(&tenant).await?;
    Ok((tenant, session))
}
