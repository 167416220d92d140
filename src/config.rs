//! Configuration handling for the warehouse MCP server.
//!
//! Configuration is environment-first (the deployment supplies DB_* variables)
//! with CLI flags layered on top via clap. Anything the credential resolver
//! needs is validated fail-fast at startup, not lazily mid-query.

use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// Connection cache defaults
pub const DEFAULT_CACHE_CAPACITY: usize = 64;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_ROLE_TEMPLATE: &str = "seller_{tenant}";
pub const DEFAULT_DIRECTORY_TABLE: &str = "public.sellers";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with streamable responses (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the warehouse MCP server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "warehouse-mcp-server",
    about = "MCP server exposing per-seller warehouse access to LLM analytics agents",
    version,
    author
)]
pub struct Config {
    /// Warehouse host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Warehouse database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Administrative user (directory loading and admin fallback)
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Administrative password (sensitive - never logged)
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Warehouse port
    #[arg(long, default_value_t = DEFAULT_DB_PORT, env = "DB_PORT")]
    pub db_port: u16,

    /// Shared secret paired with derived tenant roles (sensitive - never logged)
    #[arg(long, env = "TENANT_DB_SECRET", hide_env_values = true)]
    pub tenant_secret: Option<String>,

    /// Role name template; `{tenant}` is replaced with the tenant id
    #[arg(
        long,
        default_value = DEFAULT_ROLE_TEMPLATE,
        env = "TENANT_ROLE_TEMPLATE"
    )]
    pub tenant_role_template: String,

    /// Degraded fallback: open every tenant session with the admin credentials
    /// instead of per-tenant roles
    #[arg(long, env = "WAREHOUSE_SHARED_ADMIN")]
    pub shared_admin: bool,

    /// Table holding the identity -> tenant mapping (columns: email, seller_id)
    #[arg(
        long,
        default_value = DEFAULT_DIRECTORY_TABLE,
        env = "SELLER_DIRECTORY_TABLE"
    )]
    pub directory_table: String,

    /// Schemas exposed by list_tables. Empty means all non-system schemas.
    #[arg(
        long = "schema",
        value_name = "SCHEMA",
        env = "WAREHOUSE_SCHEMAS",
        value_delimiter = ','
    )]
    pub allowed_schemas: Vec<String>,

    /// Maximum number of cached tenant connections
    #[arg(
        long,
        default_value_t = DEFAULT_CACHE_CAPACITY,
        env = "WAREHOUSE_CACHE_CAPACITY"
    )]
    pub cache_capacity: usize,

    /// Seconds a cached connection may sit idle before the sweep closes it
    #[arg(
        long,
        default_value_t = DEFAULT_IDLE_TIMEOUT_SECS,
        env = "WAREHOUSE_IDLE_TIMEOUT"
    )]
    pub idle_timeout: u64,

    /// Seconds between idle sweeps
    #[arg(
        long,
        default_value_t = DEFAULT_SWEEP_INTERVAL_SECS,
        env = "WAREHOUSE_SWEEP_INTERVAL"
    )]
    pub sweep_interval: u64,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection establishment timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Default row limit for db_query results
    #[arg(long, env = "MCP_ROW_LIMIT")]
    pub row_limit: Option<u32>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            db_host: None,
            db_name: None,
            db_user: None,
            db_password: None,
            db_port: DEFAULT_DB_PORT,
            tenant_secret: None,
            tenant_role_template: DEFAULT_ROLE_TEMPLATE.to_string(),
            shared_admin: false,
            directory_table: DEFAULT_DIRECTORY_TABLE.to_string(),
            allowed_schemas: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            sweep_interval: DEFAULT_SWEEP_INTERVAL_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            row_limit: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Get the idle timeout as a Duration.
    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// Get the sweep interval as a Duration.
    pub fn sweep_interval_duration(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.db_port, DEFAULT_DB_PORT);
        assert_eq!(config.tenant_role_template, "seller_{tenant}");
        assert_eq!(config.directory_table, "public.sellers");
        assert!(!config.shared_admin);
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_timeout_durations() {
        let config = Config {
            query_timeout: 60,
            connect_timeout: 15,
            idle_timeout: 120,
            ..Config::default()
        };
        assert_eq!(config.query_timeout_duration(), Duration::from_secs(60));
        assert_eq!(config.connect_timeout_duration(), Duration::from_secs(15));
        assert_eq!(config.idle_timeout_duration(), Duration::from_secs(120));
    }
}
