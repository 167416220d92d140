//! Error types for the warehouse MCP server.
//!
//! The taxonomy mirrors the failure modes the calling agent has to reason
//! about: configuration problems are fatal at startup, unknown identities are
//! rejections, connection failures are retryable, query failures carry the
//! engine message verbatim.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Unknown tenant identity: {identity}")]
    UnknownTenant { identity: String },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WarehouseError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unknown-tenant error.
    pub fn unknown_tenant(identity: impl Into<String>) -> Self {
        Self::UnknownTenant {
            identity: identity.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a query error with optional SQLSTATE.
    pub fn query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The serializable category of this error, used in tool envelopes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::UnknownTenant { .. } => ErrorKind::UnknownTenant,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Query { .. } => ErrorKind::Query,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this error is worth retrying from the caller's side.
    /// Each retry of a connection failure is a fresh establishment attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Error category exposed to the calling agent in tool result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    UnknownTenant,
    Connection,
    Query,
    Internal,
}

/// SQLSTATE classes/codes that indicate the session itself is gone rather
/// than the statement being bad. Class 08 covers connection exceptions;
/// 57P01..57P03 are server shutdown / crash / cannot-connect-now.
pub fn is_fatal_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

/// Classify a driver error as a connection-level fault.
///
/// This is the crux of the cache's eviction decision: only transport and
/// session faults may report a connection dead. A `Database` error with a
/// non-fatal SQLSTATE is a statement problem against a healthy session.
pub fn is_connection_fault(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|c| is_fatal_sqlstate(&c))
            .unwrap_or(false),
        _ => false,
    }
}

/// Convert sqlx errors to WarehouseError.
impl From<sqlx::Error> for WarehouseError {
    fn from(err: sqlx::Error) -> Self {
        if is_connection_fault(&err) {
            return WarehouseError::connection(err.to_string());
        }
        match err {
            sqlx::Error::Configuration(msg) => WarehouseError::configuration(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                WarehouseError::query(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => WarehouseError::query("No rows returned", None),
            sqlx::Error::ColumnDecode { index, source } => {
                WarehouseError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                WarehouseError::internal(format!("Decode error: {}", source))
            }
            other => WarehouseError::internal(format!("Unexpected database error: {}", other)),
        }
    }
}

/// Result type alias for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;
