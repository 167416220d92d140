//! Query-related data models.
//!
//! The central type is [`QueryOutcome`]: a tagged success/failure envelope
//! produced fresh per call. Failures are data, not exceptions; the calling
//! agent branches on them.

use crate::error::{ErrorKind, WarehouseError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for db_query results.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Execution mode: read fetches rows, write reports affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Read,
    Write,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Engine-reported type (e.g. "int8", "varchar", "numeric")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Result of executing caller-supplied SQL. Exactly one variant per call.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    Success {
        columns: Vec<ColumnMetadata>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
        /// Only set in write mode.
        rows_affected: Option<u64>,
        truncated: bool,
        execution_time_ms: u64,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl QueryOutcome {
    /// Build a read-mode success.
    pub fn rows(
        columns: Vec<ColumnMetadata>,
        rows: Vec<serde_json::Map<String, JsonValue>>,
        truncated: bool,
        execution_time_ms: u64,
    ) -> Self {
        Self::Success {
            columns,
            rows,
            rows_affected: None,
            truncated,
            execution_time_ms,
        }
    }

    /// Build a write-mode success.
    pub fn written(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self::Success {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: Some(rows_affected),
            truncated: false,
            execution_time_ms,
        }
    }

    /// Fold an error into a failure outcome.
    pub fn failure(err: &WarehouseError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_outcome() {
        let outcome = QueryOutcome::rows(
            vec![ColumnMetadata::new("id", "int8", false)],
            Vec::new(),
            false,
            12,
        );
        assert!(outcome.is_success());
        match outcome {
            QueryOutcome::Success {
                rows_affected,
                columns,
                ..
            } => {
                assert!(rows_affected.is_none());
                assert_eq!(columns[0].name, "id");
            }
            QueryOutcome::Failure { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_write_outcome() {
        let outcome = QueryOutcome::written(3, 5);
        match outcome {
            QueryOutcome::Success { rows_affected, .. } => assert_eq!(rows_affected, Some(3)),
            QueryOutcome::Failure { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_failure_outcome_carries_kind() {
        let err = WarehouseError::query("relation \"nope\" does not exist", Some("42P01".into()));
        let outcome = QueryOutcome::failure(&err);
        assert!(!outcome.is_success());
        match outcome {
            QueryOutcome::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::Query);
                assert!(message.contains("does not exist"));
            }
            QueryOutcome::Success { .. } => unreachable!(),
        }
    }
}
