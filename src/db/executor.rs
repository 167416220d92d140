//! Query execution against cached tenant sessions.
//!
//! Every statement runs inside an explicit transaction on the tenant's
//! cached connection. Read mode streams rows up to a limit and ends its
//! transaction with a rollback, so a statement routed through the read path
//! can never persist a side effect; write mode executes, commits, and
//! reports affected rows. Any execution error triggers a rollback before
//! the failure is reported; without the rollback a single bad statement
//! leaves the session in aborted-transaction state and every later query on
//! the cached handle fails until eviction.
//!
//! The executor's contract is total: it returns a tagged [`QueryOutcome`],
//! never an error. The session lock is held from the first statement through
//! commit or rollback, so outcomes of concurrent calls on one tenant never
//! interleave mid-protocol.

use crate::db::cache::SharedSession;
use crate::db::types::{column_metadata, row_to_json_map};
use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{ColumnMetadata, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryMode, QueryOutcome};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{Connection, Executor, PgConnection};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes caller-supplied SQL with the commit/rollback protocol.
pub struct QueryExecutor {
    default_timeout: Duration,
    default_limit: u32,
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(crate::config::DEFAULT_QUERY_TIMEOUT_SECS),
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_defaults(timeout_secs: u64, row_limit: u32) -> Self {
        Self {
            default_timeout: Duration::from_secs(timeout_secs),
            default_limit: row_limit.clamp(1, MAX_ROW_LIMIT),
        }
    }

    /// Execute `sql` on the tenant's session in the given mode.
    pub async fn execute(
        &self,
        session: &SharedSession<PgConnection>,
        sql: &str,
        mode: QueryMode,
        limit: Option<u32>,
    ) -> QueryOutcome {
        let start = Instant::now();
        let mut conn = session.lock().await;

        debug!(sql = %sql, mode = ?mode, "Executing statement");

        let result = match mode {
            QueryMode::Read => {
                let row_limit = limit
                    .map(|l| l.clamp(1, MAX_ROW_LIMIT))
                    .unwrap_or(self.default_limit);
                self.run_read(&mut conn, sql, row_limit).await
            }
            QueryMode::Write => self.run_write(&mut conn, sql).await.map(|rows_affected| {
                ReadResult {
                    columns: Vec::new(),
                    rows: Vec::new(),
                    rows_affected: Some(rows_affected),
                    truncated: false,
                }
            }),
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(res) => match res.rows_affected {
                Some(n) => QueryOutcome::written(n, execution_time_ms),
                None => QueryOutcome::rows(res.columns, res.rows, res.truncated, execution_time_ms),
            },
            Err(err) => {
                warn!(error = %err, "Statement failed, session rolled back");
                QueryOutcome::failure(&err)
            }
        }
    }

    async fn run_read(
        &self,
        conn: &mut PgConnection,
        sql: &str,
        row_limit: u32,
    ) -> WarehouseResult<ReadResult> {
        let mut tx = conn.begin().await.map_err(WarehouseError::from)?;

        // Fetch one past the limit so truncation is detectable without
        // pulling the whole result set.
        let fetch_limit = row_limit as usize + 1;
        let fetched = {
            let rows_future = (&mut *tx).fetch(sql).take(fetch_limit).collect::<Vec<_>>();
            match timeout(self.default_timeout, rows_future).await {
                Ok(results) => collect_rows(results),
                Err(_) => Err(statement_timeout(self.default_timeout)),
            }
        };

        match fetched {
            Ok(mut rows) => {
                // Reads never commit: any side effect smuggled through the
                // read path is discarded here. The rows are already fetched,
                // so a rollback failure does not invalidate them.
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Ending read transaction did not complete");
                }
                let truncated = rows.len() > row_limit as usize;
                rows.truncate(row_limit as usize);
                let columns = rows.first().map(column_metadata).unwrap_or_default();
                let json_rows = rows.iter().map(row_to_json_map).collect();
                Ok(ReadResult {
                    columns,
                    rows: json_rows,
                    rows_affected: None,
                    truncated,
                })
            }
            Err(err) => {
                // Mandatory: clear the aborted-transaction state so the
                // cached session stays usable for the tenant's next call.
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "Rollback after failed read did not complete");
                }
                Err(err)
            }
        }
    }

    async fn run_write(&self, conn: &mut PgConnection, sql: &str) -> WarehouseResult<u64> {
        let mut tx = conn.begin().await.map_err(WarehouseError::from)?;

        let executed = match timeout(self.default_timeout, (&mut *tx).execute(sql)).await {
            Ok(Ok(result)) => Ok(result.rows_affected()),
            Ok(Err(e)) => Err(WarehouseError::from(e)),
            Err(_) => Err(statement_timeout(self.default_timeout)),
        };

        match executed {
            Ok(rows_affected) => {
                tx.commit().await.map_err(WarehouseError::from)?;
                Ok(rows_affected)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback().await {
                    warn!(error = %rb, "Rollback after failed write did not complete");
                }
                Err(err)
            }
        }
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

struct ReadResult {
    columns: Vec<ColumnMetadata>,
    rows: Vec<serde_json::Map<String, JsonValue>>,
    rows_affected: Option<u64>,
    truncated: bool,
}

fn collect_rows(results: Vec<Result<PgRow, sqlx::Error>>) -> WarehouseResult<Vec<PgRow>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(WarehouseError::from)?);
    }
    Ok(rows)
}

fn statement_timeout(elapsed: Duration) -> WarehouseError {
    WarehouseError::query(
        format!("statement timed out after {}s", elapsed.as_secs()),
        None,
    )
}
