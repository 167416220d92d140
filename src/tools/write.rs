//! Write query tool.
//!
//! Routes caller-supplied SQL through the executor in write mode: execute,
//! commit, report affected rows. A failed write is rolled back and leaves no
//! partial effect.

use crate::db::{PgConnectionCache, QueryExecutor};
use crate::error::{ErrorKind, WarehouseError};
use crate::models::{QueryMode, QueryOutcome};
use crate::tenant::TenantDirectory;
use crate::tools::session_for_identity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the db_write tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DbWriteInput {
    /// Caller identity (email) used to select the tenant
    pub identity: String,
    /// SQL write statement (INSERT, UPDATE, DELETE)
    pub sql: String,
}

/// Output envelope for the db_write tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DbWriteOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl DbWriteOutput {
    pub fn from_outcome(outcome: QueryOutcome) -> Self {
        match outcome {
            QueryOutcome::Success {
                rows_affected,
                execution_time_ms,
                ..
            } => Self {
                success: true,
                rows_affected,
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
            rows_affected: None,
            execution_time_ms: 0,
            error: Some(message),
            error_kind: Some(kind),
        }
    }
}

/// Handler for write execution.
pub struct WriteToolHandler {
    directory: Arc<TenantDirectory>,
    cache: Arc<PgConnectionCache>,
    executor: QueryExecutor,
}

impl WriteToolHandler {
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

    pub async fn db_write(&self, input: DbWriteInput) -> DbWriteOutput {
        let (tenant, session) =
            match session_for_identity(&self.directory, &self.cache, &input.identity).await {
                Ok(resolved) => resolved,
                Err(e) => return DbWriteOutput::from_error(&e),
            };

        let outcome = self
            .executor
            .execute(&session, &input.sql, QueryMode::Write, None)
            .await;

        let output = DbWriteOutput::from_outcome(outcome);
        info!(
            tenant = %tenant,
            success = output.success,
            rows_affected = ?output.rows_affected,
            execution_time_ms = output.execution_time_ms,
            "db_write executed"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_from_write_outcome() {
        let output = DbWriteOutput::from_outcome(QueryOutcome::written(3, 11));
        assert!(output.success);
        assert_eq!(output.rows_affected, Some(3));
        assert_eq!(output.execution_time_ms, 11);
    }

    #[test]
    fn test_output_from_failure() {
        let err = WarehouseError::query("duplicate key value", Some("23505".into()));
        let output = DbWriteOutput::from_outcome(QueryOutcome::failure(&err));
        assert!(!output.success);
        assert!(output.rows_affected.is_none());
        assert_eq!(output.error_kind, Some(ErrorKind::Query));
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let output = DbWriteOutput::from_outcome(QueryOutcome::written(1, 2));
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"rows_affected\":1"));
        assert!(!json.contains("error"));
    }
}
