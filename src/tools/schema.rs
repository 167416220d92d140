//! Catalog tools: list_tables and get_schema.

use crate::db::{CatalogInspector, PgConnectionCache};
use crate::error::{ErrorKind, WarehouseError};
use crate::models::{ColumnDescription, split_qualified_name};
use crate::tenant::TenantDirectory;
use crate::tools::session_for_identity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Caller identity (email) used to select the tenant
    pub identity: String,
}

/// One table or view visible to the caller.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableEntryOutput {
    /// Qualified `schema.table` name to reference in SQL
    pub name: String,
    /// "TABLE" or "VIEW"
    #[serde(rename = "type")]
    pub table_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Output envelope for the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub success: bool,
    pub tables: Vec<TableEntryOutput>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ListTablesOutput {
    fn from_error(err: &WarehouseError) -> Self {
        Self {
            success: false,
            tables: Vec::new(),
            count: 0,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

/// Input for the get_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSchemaInput {
    /// Table name, optionally schema-qualified (`sales.orders`); unqualified
    /// names resolve in `public`
    pub table: String,
    /// Caller identity (email) used to select the tenant
    pub identity: String,
}

/// One described column.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnOutput {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl From<ColumnDescription> for ColumnOutput {
    fn from(col: ColumnDescription) -> Self {
        Self {
            name: col.name,
            data_type: col.data_type,
            max_length: col.max_length,
            nullable: col.nullable,
            default: col.default,
            comment: col.comment,
        }
    }
}

/// Output envelope for the get_schema tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetSchemaOutput {
    pub success: bool,
    /// False when the relation does not exist or is not visible
    pub found: bool,
    /// Qualified name that was looked up
    pub table: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl GetSchemaOutput {
    fn not_found(qualified: String) -> Self {
        Self {
            success: true,
            found: false,
            message: Some(format!("relation '{}' not found", qualified)),
            table: qualified,
            columns: Vec::new(),
            error: None,
            error_kind: None,
        }
    }

    fn from_error(qualified: String, err: &WarehouseError) -> Self {
        Self {
            success: false,
            found: false,
            table: qualified,
            columns: Vec::new(),
            message: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

/// Handler for the catalog tools.
pub struct SchemaToolHandler {
    directory: Arc<TenantDirectory>,
    cache: Arc<PgConnectionCache>,
    allowed_schemas: Vec<String>,
}

impl SchemaToolHandler {
    pub fn new(
        directory: Arc<TenantDirectory>,
        cache: Arc<PgConnectionCache>,
        allowed_schemas: Vec<String>,
    ) -> Self {
        Self {
            directory,
            cache,
            allowed_schemas,
        }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> ListTablesOutput {
        let (tenant, session) =
            match session_for_identity(&self.directory, &self.cache, &input.identity).await {
                Ok(resolved) => resolved,
                Err(e) => return ListTablesOutput::from_error(&e),
            };

        let listed = {
            let mut conn = session.lock().await;
            CatalogInspector::list_tables(&mut conn, &self.allowed_schemas).await
        };

        match listed {
            Ok(entries) => {
                let tables: Vec<TableEntryOutput> = entries
                    .into_iter()
                    .map(|e| TableEntryOutput {
                        name: e.qualified_name(),
                        table_type: e.table_type,
                        comment: e.comment,
                    })
                    .collect();
                info!(tenant = %tenant, count = tables.len(), "list_tables executed");
                ListTablesOutput {
                    success: true,
                    count: tables.len(),
                    tables,
                    error: None,
                    error_kind: None,
                }
            }
            Err(e) => ListTablesOutput::from_error(&e),
        }
    }

    pub async fn get_schema(&self, input: GetSchemaInput) -> GetSchemaOutput {
        let (schema, table) = split_qualified_name(&input.table);
        let qualified = format!("{}.{}", schema, table);

        let (tenant, session) =
            match session_for_identity(&self.directory, &self.cache, &input.identity).await {
                Ok(resolved) => resolved,
                Err(e) => return GetSchemaOutput::from_error(qualified, &e),
            };

        let described = {
            let mut conn = session.lock().await;
            CatalogInspector::describe_table(&mut conn, &schema, &table).await
        };

        match described {
            Ok(Some(description)) => {
                info!(
                    tenant = %tenant,
                    table = %qualified,
                    columns = description.columns.len(),
                    "get_schema executed"
                );
                GetSchemaOutput {
                    success: true,
                    found: true,
                    table: qualified,
                    columns: description.columns.into_iter().map(Into::into).collect(),
                    message: None,
                    error: None,
                    error_kind: None,
                }
            }
            Ok(None) => {
                info!(tenant = %tenant, table = %qualified, "get_schema: relation not found");
                GetSchemaOutput::not_found(qualified)
            }
            Err(e) => GetSchemaOutput::from_error(qualified, &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_output_is_explicit() {
        let output = GetSchemaOutput::not_found("public.missing".into());
        assert!(output.success);
        assert!(!output.found);
        assert!(output.message.unwrap().contains("public.missing"));
        assert!(output.error.is_none());
    }

    #[test]
    fn test_error_output() {
        let err = WarehouseError::connection("refused");
        let output = GetSchemaOutput::from_error("public.orders".into(), &err);
        assert!(!output.success);
        assert!(!output.found);
        assert_eq!(output.error_kind, Some(ErrorKind::Connection));
    }

    #[test]
    fn test_column_output_conversion() {
        let col = ColumnDescription {
            name: "total".into(),
            data_type: "numeric".into(),
            max_length: None,
            nullable: false,
            default: Some("0".into()),
            comment: None,
        };
        let out: ColumnOutput = col.into();
        assert_eq!(out.name, "total");
        assert!(!out.nullable);
        assert_eq!(out.default.as_deref(), Some("0"));
    }

    #[test]
    fn test_list_tables_error_envelope() {
        let err = WarehouseError::unknown_tenant("ghost@example.com");
        let output = ListTablesOutput::from_error(&err);
        assert!(!output.success);
        assert_eq!(output.count, 0);
        assert_eq!(output.error_kind, Some(ErrorKind::UnknownTenant));
    }
}
