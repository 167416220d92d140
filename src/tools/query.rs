//! Read query tool.
//!
//! Routes caller-supplied SQL through the executor in read mode on the
//! caller's tenant session.

use crate::db::{PgConnectionCache, QueryExecutor};
use crate::error::{ErrorKind, WarehouseError};
use crate::models::{ColumnMetadata, QueryMode, QueryOutcome};
use crate::tenant::TenantDirectory;
use crate::tools::session_for_identity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the db_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DbQueryInput {
    /// Caller identity (email) used to select the tenant
    pub identity: String,
    /// SQL statement to execute read-only
    pub sql: String,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Output envelope for the db_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DbQueryOutput {
    pub success: bool,
    /// Column metadata (name, type, nullable). Empty on failure.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnMetadata>,
    /// Result rows as key-value maps. Empty on failure.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    /// True if the result was cut at the row limit
    pub truncated: bool,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl DbQueryOutput {
    pub fn from_outcome(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Success {
                columns,
                rows,
                truncated,
                execution_time_ms,
                ..
            } => Self {
                success: true,
                row_count: rows.len(),
                columns,
                rows,
                truncated,
                execution_time_ms,
                error: None,
                error_kind: None,
            },
            QueryOutcome::Failure { kind, message } => Self::failed(kind, message),
        }
    }

    pub fn from_error(err: &WarehouseError) -> Self {
        Self::failed(err.kind(), err.to_string())
    }

    fn failed(kind: ErrorKind, message: String) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            truncated: false,
            execution_time_ms: 0,
            error: Some(message),
            error_kind: Some(kind),
        }
    }
}

/// Handler for read query execution.
pub struct QueryToolHandler {
    directory: Arc<TenantDirectory>,
    cache: Arc<PgConnectionCache>,
    executor: QueryExecutor,
}

impl QueryToolHandler {
    pub fn new(
        directory: Arc<TenantDirectory>,
        cache: Arc<PgConnectionCache>,
        executor: QueryExecutor,
    ) -> Self {
        Self {
            directory,
            cache,
            executor,
        }
    }

    pub async fn db_query(&self, input: DbQueryInput) -> DbQueryOutput {
        let (tenant, session) =
            match session_for_identity(&self.directory, &self.cache, &input.identity).await {
                Ok(resolved) => resolved,
                Err(e) => return DbQueryOutput::from_error(&e),
            };

        let outcome = self
            .executor
            .execute(&session, &input.sql, QueryMode::Read, input.limit)
            .await;

        let output = DbQueryOutput::from_outcome(outcome);
        info!(
            tenant = %tenant,
            success = output.success,
            row_count = output.row_count,
            truncated = output.truncated,
            execution_time_ms = output.execution_time_ms,
            "db_query executed"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_deserialization() {
        let json = r#"{
            "identity": "alice@acme.example",
            "sql": "SELECT * FROM sales.orders LIMIT 5",
            "limit": 100
        }"#;

        let input: DbQueryInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.identity, "alice@acme.example");
        assert_eq!(input.limit, Some(100));
    }

    #[test]
    fn test_output_from_success_outcome() {
        let mut row = serde_json::Map::new();
        row.insert("id".to_string(), JsonValue::Number(1.into()));
        let outcome = QueryOutcome::rows(
            vec![ColumnMetadata::new("id", "int8", false)],
            vec![row],
            false,
            7,
        );

        let output = DbQueryOutput::from_outcome(outcome);
        assert!(output.success);
        assert_eq!(output.row_count, 1);
        assert!(output.error.is_none());

        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"row_count\":1"));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_output_from_failure_outcome() {
        let err = WarehouseError::query("relation does not exist", Some("42P01".into()));
        let output = DbQueryOutput::from_outcome(QueryOutcome::failure(&err));
        assert!(!output.success);
        assert_eq!(output.error_kind, Some(ErrorKind::Query));
        assert!(output.error.unwrap().contains("does not exist"));
    }

    #[test]
    fn test_output_from_unknown_tenant() {
        let err = WarehouseError::unknown_tenant("ghost@example.com");
        let output = DbQueryOutput::from_error(&err);
        assert!(!output.success);
        assert_eq!(output.error_kind, Some(ErrorKind::UnknownTenant));
    }
}
