//! Session liveness: the seam between the connection cache and the driver.
//!
//! [`WarehouseSession`] is the trait the cache manages entries through:
//! establish, probe, close. The production implementation is
//! `sqlx::PgConnection`; tests substitute an in-memory session to exercise
//! the cache state machine without a database.
//!
//! The probe is a real round trip (`SELECT 1`), never a local "is closed"
//! check: a false "alive" answer would hand a dead handle to the executor.
//! Only connection-level faults report dead. A query-level failure of the
//! no-op is unexpected and propagates as an error so a healthy connection is
//! not evicted over a transient statement problem.

use crate::db::credentials::Credentials;
use crate::error::{WarehouseError, WarehouseResult, is_connection_fault};
use sqlx::{Connection, PgConnection};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// A single authenticated warehouse session, as seen by the cache.
pub trait WarehouseSession: Send + Sized + 'static {
    /// Open a new session with the given credentials.
    fn establish(
        creds: &Credentials,
        connect_timeout: Duration,
    ) -> impl Future<Output = WarehouseResult<Self>> + Send;

    /// Round-trip liveness check. `Ok(false)` means the session is dead and
    /// must be evicted; `Err` means the probe itself failed for a reason
    /// unrelated to connectivity and the session must be left in place.
    fn probe(&mut self) -> impl Future<Output = WarehouseResult<bool>> + Send;

    /// Terminate the session. Best-effort; errors are swallowed.
    fn close(self) -> impl Future<Output = ()> + Send;
}

impl WarehouseSession for PgConnection {
    async fn establish(
        creds: &Credentials,
        connect_timeout: Duration,
    ) -> WarehouseResult<Self> {
        let options = creds.connect_options();
        match tokio::time::timeout(connect_timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(WarehouseError::connection(format!(
                "failed to connect as role '{}': {}",
                creds.role, e
            ))),
            Err(_) => Err(WarehouseError::connection(format!(
                "connecting as role '{}' timed out after {}s",
                creds.role,
                connect_timeout.as_secs()
            ))),
        }
    }

    async fn probe(&mut self) -> WarehouseResult<bool> {
        match sqlx::query("SELECT 1").execute(&mut *self).await {
            Ok(_) => Ok(true),
            Err(e) if is_connection_fault(&e) => {
                debug!(error = %e, "Liveness probe found session dead");
                Ok(false)
            }
            Err(e) => Err(WarehouseError::from(e)),
        }
    }

    async fn close(self) {
        if let Err(e) = Connection::close(self).await {
            debug!(error = %e, "Error closing warehouse session");
        }
    }
}
