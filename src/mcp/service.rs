//! MCP service implementation using rmcp.
//!
//! Exposes the four warehouse tools via the rmcp framework's macros. Every
//! tool returns its envelope as data: failures are part of the payload, so
//! the calling agent can narrate them instead of handling protocol errors.

use crate::db::{PgConnectionCache, QueryExecutor};
use crate::tenant::TenantDirectory;
use crate::tools::query::{DbQueryInput, DbQueryOutput, QueryToolHandler};
use crate::tools::schema::{
    GetSchemaInput, GetSchemaOutput, ListTablesInput, ListTablesOutput, SchemaToolHandler,
};
use crate::tools::write::{DbWriteInput, DbWriteOutput, WriteToolHandler};
use rmcp::Json;
use rmcp::{
    ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct WarehouseService {
    /// Identity -> tenant snapshot, loaded at startup
    directory: Arc<TenantDirectory>,
    /// Shared per-tenant connection cache
    cache: Arc<PgConnectionCache>,
    /// Schemas exposed by list_tables (empty = all non-system)
    allowed_schemas: Vec<String>,
    query_timeout_secs: u64,
    row_limit: u32,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl WarehouseService {
    pub fn new(
        directory: Arc<TenantDirectory>,
        cache: Arc<PgConnectionCache>,
        allowed_schemas: Vec<String>,
        query_timeout_secs: u64,
        row_limit: u32,
    ) -> Self {
        Self {
            directory,
            cache,
            allowed_schemas,
            query_timeout_secs,
            row_limit,
            tool_router: Self::tool_router(),
        }
    }

    fn executor(&self) -> QueryExecutor {
        QueryExecutor::with_defaults(self.query_timeout_secs, self.row_limit)
    }

    #[tool(
        description = "List the tables and views the caller may query.\nReturns qualified schema.table names to reference in SQL."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Json<ListTablesOutput> {
        let handler = SchemaToolHandler::new(
            self.directory.clone(),
            self.cache.clone(),
            self.allowed_schemas.clone(),
        );
        Json(handler.list_tables(input).await)
    }

    #[tool(
        description = "Describe a table's columns: name, type, nullability, default, comment.\nAccepts schema-qualified names (sales.orders); unqualified names resolve in public.\nReturns found: false for unknown relations."
    )]
    async fn get_schema(
        &self,
        Parameters(input): Parameters<GetSchemaInput>,
    ) -> Json<GetSchemaOutput> {
        let handler = SchemaToolHandler::new(
            self.directory.clone(),
            self.cache.clone(),
            self.allowed_schemas.clone(),
        );
        Json(handler.get_schema(input).await)
    }

    #[tool(
        description = "Execute a read-only SQL query on the caller's tenant connection.\nReturns columns and rows, or success: false with the engine's error message.\nResults are capped at the row limit; truncated: true marks a cut result."
    )]
    async fn db_query(
        &self,
        Parameters(input): Parameters<DbQueryInput>,
    ) -> Json<DbQueryOutput> {
        let handler = QueryToolHandler::new(
            self.directory.clone(),
            self.cache.clone(),
            self.executor(),
        );
        Json(handler.db_query(input).await)
    }

    #[tool(
        description = "Execute a write statement (INSERT, UPDATE, DELETE) on the caller's tenant connection.\nCommits on success and reports rows_affected; a failed statement is rolled back and leaves no partial effect."
    )]
    async fn db_write(
        &self,
        Parameters(input): Parameters<DbWriteInput>,
    ) -> Json<DbWriteOutput> {
        let handler = WriteToolHandler::new(
            self.directory.clone(),
            self.cache.clone(),
            self.executor(),
        );
        Json(handler.db_write(input).await)
    }
}

#[tool_handler]
impl ServerHandler for WarehouseService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "warehouse-mcp-server".to_owned(),
                title: Some("Warehouse MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Per-seller warehouse access for analytics agents.\n\
                \n\
                ## Workflow\n\
                1. Every tool takes an `identity` (the caller's email); it selects the seller\n\
                   whose data the call runs against\n\
                2. Call `list_tables` to see the relations the seller may reference\n\
                3. Call `get_schema` with a qualified name before writing SQL against it\n\
                4. Use `db_query` for SELECTs and `db_write` for INSERT/UPDATE/DELETE\n\
                \n\
                ## Results\n\
                Every tool returns a `success` flag. On failure, `error` carries the engine\n\
                message verbatim and `error_kind` categorizes it:\n\
                - `unknown_tenant`: the identity is not registered; it cannot be retried\n\
                - `connection`: establishing the seller's connection failed; retrying makes\n\
                  a fresh attempt\n\
                - `query`: the SQL itself failed; fix the statement and retry\n\
                \n\
                A failed statement never wedges the seller's connection - the session is\n\
                rolled back and the next call runs normally."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{CacheOptions, ConnectionCache, CredentialResolver};

    fn create_test_service() -> WarehouseService {
        let config = Config {
            db_host: Some("localhost".into()),
            db_name: Some("analytics".into()),
            db_user: Some("admin".into()),
            db_password: Some("pass".into()),
            tenant_secret: Some("secret".into()),
            ..Config::default()
        };
        let resolver = CredentialResolver::from_config(&config).unwrap();
        let cache = Arc::new(ConnectionCache::new(resolver, CacheOptions::default()));
        let directory = Arc::new(TenantDirectory::from_entries([(
            "alice@acme.example",
            crate::tenant::TenantId::new("acme"),
        )]));
        WarehouseService::new(directory, cache, Vec::new(), 30, 1000)
    }

    #[test]
    fn test_service_creation() {
        let service = create_test_service();
        assert_eq!(service.query_timeout_secs, 30);
        assert_eq!(service.row_limit, 1000);
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "warehouse-mcp-server");
        let instructions = info.instructions.unwrap();
        assert!(instructions.contains("identity"));
        assert!(instructions.contains("db_query"));
    }
}
