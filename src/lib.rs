//! Warehouse MCP Server Library
//!
//! Per-seller data access for LLM analytics agents: tool calls resolve the
//! caller's identity to a tenant, reuse that tenant's cached warehouse
//! connection, and run caller-supplied SQL with a commit/rollback protocol
//! that keeps cached sessions healthy across failures.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tenant;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{WarehouseError, WarehouseResult};
pub use mcp::WarehouseService;
