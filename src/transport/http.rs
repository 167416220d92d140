//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! Suitable for web-based MCP integrations; serves the MCP protocol over
//! HTTP with streaming responses and per-session state.

use crate::db::PgConnectionCache;
use crate::error::{WarehouseError, WarehouseResult};
use crate::mcp::WarehouseService;
use crate::transport::Transport;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

pub struct HttpTransport {
    service: WarehouseService,
    cache: Arc<PgConnectionCache>,
    host: String,
    port: u16,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        service: WarehouseService,
        cache: Arc<PgConnectionCache>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service,
            cache,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> WarehouseResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let prototype = self.service.clone();
        let service = StreamableHttpService::new(
            move || Ok(prototype.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service doesn't support root path "/", use fallback_service instead
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        };

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            WarehouseError::connection(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        // Streaming connections may keep the server alive indefinitely, so
        // shutdown is forced after a timeout once the signal is received.
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(WarehouseError::internal(format!(
                            "HTTP server error: {}",
                            e
                        )));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {
                // Timeout or second signal reached - server will be dropped
            }
        }

        info!("Closing warehouse connections");
        self.cache.close_all().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{CacheOptions, ConnectionCache, CredentialResolver};
    use crate::tenant::TenantDirectory;

    fn test_parts() -> (WarehouseService, Arc<PgConnectionCache>) {
        let config = Config {
            db_host: Some("localhost".into()),
            db_name: Some("analytics".into()),
            db_user: Some("admin".into()),
            db_password: Some("pass".into()),
            tenant_secret: Some("secret".into()),
            ..Config::default()
        };
        let resolver = CredentialResolver::from_config(&config).unwrap();
        let cache = Arc::new(ConnectionCache::new(resolver, CacheOptions::default()));
        let directory = Arc::new(TenantDirectory::default());
        let service =
            WarehouseService::new(directory, cache.clone(), Vec::new(), 30, 1000);
        (service, cache)
    }

    #[test]
    fn test_http_transport_bind_addr() {
        let (service, cache) = test_parts();
        let transport = HttpTransport::new(service, cache, "0.0.0.0", 3000, "/mcp");
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "0.0.0.0:3000");
        assert_eq!(transport.endpoint(), "/mcp");
    }

    #[test]
    fn test_http_transport_root_endpoint() {
        let (service, cache) = test_parts();
        let transport = HttpTransport::new(service, cache, "127.0.0.1", 8080, "/");
        assert_eq!(transport.endpoint(), "/");
    }
}
