//! Warehouse MCP Server - Main entry point.
//!
//! Composition root: validates configuration, loads the tenant directory
//! over the administrative connection, builds the per-tenant connection
//! cache, and runs the selected transport.

use clap::Parser;
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use warehouse_mcp_server::config::{Config, TransportMode};
use warehouse_mcp_server::db::{
    CacheOptions, ConnectionCache, CredentialResolver, WarehouseSession,
};
use warehouse_mcp_server::mcp::WarehouseService;
use warehouse_mcp_server::models::DEFAULT_ROW_LIMIT;
use warehouse_mcp_server::tenant::TenantDirectory;
use warehouse_mcp_server::transport::{HttpTransport, StdioTransport, Transport};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Logging stays off by default so the stdio protocol stream is clean.
    if config.enable_logs {
        init_tracing(&config);
    }

    info!(
        transport = %config.transport,
        "Starting Warehouse MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Fail fast on missing configuration, before anything touches the wire.
    let resolver = CredentialResolver::from_config(&config)?;
    if resolver.is_shared_admin() {
        warn!("Running in shared-admin fallback mode: tenant sessions use admin credentials");
    }

    // Load the identity -> tenant snapshot over the admin connection, then
    // release it; tenant traffic runs on per-tenant sessions.
    let directory = {
        let admin_creds = resolver.resolve_admin();
        let mut admin_conn =
            PgConnection::establish(&admin_creds, config.connect_timeout_duration()).await?;
        let directory = TenantDirectory::load(&mut admin_conn, &config.directory_table).await?;
        WarehouseSession::close(admin_conn).await;
        directory
    };

    if directory.is_empty() {
        warn!(
            table = %config.directory_table,
            "Tenant directory is empty; every tool call will be rejected as unknown"
        );
    }

    let cache = Arc::new(ConnectionCache::new(
        resolver,
        CacheOptions {
            capacity: config.cache_capacity,
            idle_timeout: config.idle_timeout_duration(),
            connect_timeout: config.connect_timeout_duration(),
        },
    ));
    cache
        .clone()
        .start_idle_sweep(config.sweep_interval_duration());

    let service = WarehouseService::new(
        Arc::new(directory),
        cache.clone(),
        config.allowed_schemas.clone(),
        config.query_timeout,
        config.row_limit.unwrap_or(DEFAULT_ROW_LIMIT),
    );

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            let transport = StdioTransport::new(service, cache);
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                service,
                cache,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
