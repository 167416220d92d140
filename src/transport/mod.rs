//! Transport layer for the MCP server.
//!
//! - Stdio: standard input/output for CLI integration
//! - HTTP: streamable HTTP (axum) for web clients
//!
//! Both run until a shutdown signal, then close every cached warehouse
//! connection.

pub mod http;
pub mod stdio;

pub use http::HttpTransport;
pub use stdio::StdioTransport;

use crate::error::WarehouseResult;
use std::future::Future;

/// Trait for MCP transport implementations.
pub trait Transport: Send + Sync {
    /// Start the transport and block until it is shut down.
    fn run(&self) -> impl Future<Output = WarehouseResult<()>> + Send;

    /// Name of this transport for logging.
    fn name(&self) -> &'static str;
}
