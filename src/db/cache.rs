//! Per-tenant connection cache and lifecycle manager.
//!
//! This is the only stateful component in the crate. It maps a tenant id to
//! at most one live warehouse session: `get` probes an existing entry before
//! reuse, evicts and recreates it when the probe finds it dead, and opens a
//! fresh credentialed session when no entry exists. Entries are replaced,
//! never duplicated.
//!
//! The whole check-evict-create sequence for a tenant runs under the map
//! lock, so two concurrent `get` calls for the same new tenant produce
//! exactly one entry and the second caller sees the first caller's freshly
//! probed handle. Lock order is always map -> connection handle; the
//! executor only ever takes a handle lock, so the order is acyclic.
//!
//! The cache is an explicitly constructed object owned by the composition
//! root, not a process global: each test builds its own, and shutdown calls
//! `close_all`. Growth is bounded by an LRU capacity cap plus an idle sweep.

use crate::db::credentials::CredentialResolver;
use crate::db::probe::WarehouseSession;
use crate::error::WarehouseResult;
use crate::tenant::TenantId;
use sqlx::PgConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A cached session handle. Shared with at most the query executor; the
/// inner mutex serializes the statement + commit/rollback protocol.
pub type SharedSession<S> = Arc<Mutex<S>>;

/// The production cache over live Postgres sessions.
pub type PgConnectionCache = ConnectionCache<PgConnection>;

/// Tuning knobs for the cache, owned by the composition root.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Maximum number of cached tenant connections (LRU beyond this).
    pub capacity: usize,
    /// Idle age after which the sweep closes an entry.
    pub idle_timeout: Duration,
    /// Bound on session establishment.
    pub connect_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            capacity: crate::config::DEFAULT_CACHE_CAPACITY,
            idle_timeout: Duration::from_secs(crate::config::DEFAULT_IDLE_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(crate::config::DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

struct CachedConnection<S> {
    tenant_id: TenantId,
    handle: SharedSession<S>,
    created_at: Instant,
    last_used: Instant,
}

/// Map of tenant id -> live session, with get-or-create semantics.
pub struct ConnectionCache<S: WarehouseSession> {
    resolver: CredentialResolver,
    options: CacheOptions,
    entries: Mutex<HashMap<TenantId, CachedConnection<S>>>,
}

impl<S: WarehouseSession> ConnectionCache<S> {
    /// Create an empty cache.
    pub fn new(resolver: CredentialResolver, options: CacheOptions) -> Self {
        let options = CacheOptions {
            capacity: options.capacity.max(1),
            ..options
        };
        Self {
            resolver,
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a live session for the tenant, creating one if the cache holds
    /// none or the cached one is dead.
    ///
    /// On establishment failure the cache holds no entry for the tenant, so
    /// a retry from the caller is a clean fresh attempt.
    pub async fn get(&self, tenant: &TenantId) -> WarehouseResult<SharedSession<S>> {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(tenant) {
            // Probe before reuse. An unexpected (non-connection) probe error
            // propagates and the entry stays: a healthy session must not be
            // evicted over a statement-level blip.
            let alive = entry.handle.lock().await.probe().await?;
            if alive {
                entry.last_used = Instant::now();
                debug!(tenant = %tenant, "Connection cache hit");
                return Ok(Arc::clone(&entry.handle));
            }
            warn!(tenant = %tenant, "Cached connection is dead, evicting");
            if let Some(dead) = entries.remove(tenant) {
                dispose(dead.handle).await;
            }
        }

        let creds = self.resolver.resolve(tenant);
        let session = S::establish(&creds, self.options.connect_timeout).await?;

        if entries.len() >= self.options.capacity {
            Self::evict_lru(&mut entries).await;
        }

        let now = Instant::now();
        let handle = Arc::new(Mutex::new(session));
        entries.insert(
            tenant.clone(),
            CachedConnection {
                tenant_id: tenant.clone(),
                handle: Arc::clone(&handle),
                created_at: now,
                last_used: now,
            },
        );
        info!(
            tenant = %tenant,
            role = %creds.role,
            cached = entries.len(),
            "Opened warehouse connection"
        );
        Ok(handle)
    }

    /// Drop and close the entry for a tenant. Returns whether one existed.
    pub async fn invalidate(&self, tenant: &TenantId) -> bool {
        let removed = self.entries.lock().await.remove(tenant);
        match removed {
            Some(entry) => {
                info!(tenant = %entry.tenant_id, "Invalidated cached connection");
                dispose(entry.handle).await;
                true
            }
            None => false,
        }
    }

    /// Close entries idle longer than the configured timeout. Returns the
    /// number closed.
    pub async fn close_idle(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let stale: Vec<TenantId> = entries
            .values()
            .filter(|e| e.last_used.elapsed() >= self.options.idle_timeout)
            .map(|e| e.tenant_id.clone())
            .collect();

        for tenant in &stale {
            if let Some(entry) = entries.remove(tenant) {
                info!(
                    tenant = %entry.tenant_id,
                    age_secs = entry.created_at.elapsed().as_secs(),
                    "Closing idle connection"
                );
                dispose(entry.handle).await;
            }
        }
        stale.len()
    }

    /// Close every cached connection. Called on shutdown.
    pub async fn close_all(&self) {
        let mut entries = self.entries.lock().await;
        for (tenant, entry) in entries.drain() {
            debug!(tenant = %tenant, "Closing connection");
            dispose(entry.handle).await;
        }
        info!("All warehouse connections closed");
    }

    /// Number of cached connections.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Spawn the periodic idle sweep. Call once from the composition root.
    pub fn start_idle_sweep(self: Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let closed = self.close_idle().await;
                if closed > 0 {
                    debug!(closed, "Idle sweep finished");
                }
            }
        });
    }

    async fn evict_lru(entries: &mut HashMap<TenantId, CachedConnection<S>>) {
        let lru = entries
            .values()
            .min_by_key(|e| e.last_used)
            .map(|e| e.tenant_id.clone());
        if let Some(tenant) = lru {
            if let Some(entry) = entries.remove(&tenant) {
                warn!(tenant = %tenant, "Cache at capacity, evicting least recently used");
                dispose(entry.handle).await;
            }
        }
    }
}

/// Close a removed handle. A handle still borrowed by an in-flight query
/// cannot be unwrapped; it closes when the last reference drops.
async fn dispose<S: WarehouseSession>(handle: SharedSession<S>) {
    if let Ok(mutex) = Arc::try_unwrap(handle) {
        mutex.into_inner().close().await;
    }
}
