//! Connection cache lifecycle tests.
//!
//! Exercises the cache state machine through a scripted in-memory session
//! instead of a live database: creation on first use, probed reuse, eviction
//! of dead sessions, single-flight behavior under concurrency, and the
//! capacity/idle bounds.
//!
//! Scripted behavior is keyed by the derived role name, and every test uses
//! its own tenant ids, so tests do not interfere when run concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};
use std::time::Duration;
use warehouse_mcp_server::config::Config;
use warehouse_mcp_server::db::{
    CacheOptions, ConnectionCache, CredentialResolver, Credentials, WarehouseSession,
};
use warehouse_mcp_server::error::{WarehouseError, WarehouseResult};
use warehouse_mcp_server::tenant::TenantId;

#[derive(Default)]
struct Script {
    /// Roles whose establishment fails
    fail_connect: HashSet<String>,
    /// Roles whose sessions probe dead
    dead: HashSet<String>,
    /// Roles whose probe fails with a non-connection error
    probe_error: HashSet<String>,
    /// Establish count per role
    opened: HashMap<String, u64>,
    /// Session ids that were closed
    closed: Vec<u64>,
}

fn script() -> &'static StdMutex<Script> {
    static SCRIPT: OnceLock<StdMutex<Script>> = OnceLock::new();
    SCRIPT.get_or_init(|| StdMutex::new(Script::default()))
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct MockSession {
    role: String,
    id: u64,
}

impl WarehouseSession for MockSession {
    async fn establish(creds: &Credentials, _connect_timeout: Duration) -> WarehouseResult<Self> {
        let mut s = script().lock().unwrap();
        if s.fail_connect.contains(&creds.role) {
            return Err(WarehouseError::connection(format!(
                "role '{}' rejected",
                creds.role
            )));
        }
        *s.opened.entry(creds.role.clone()).or_insert(0) += 1;
        Ok(MockSession {
            role: creds.role.clone(),
            id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn probe(&mut self) -> WarehouseResult<bool> {
        let s = script().lock().unwrap();
        if s.probe_error.contains(&self.role) {
            return Err(WarehouseError::query("probe statement failed", None));
        }
        Ok(!s.dead.contains(&self.role))
    }

    async fn close(self) {
        script().lock().unwrap().closed.push(self.id);
    }
}

fn resolver() -> CredentialResolver {
    let config = Config {
        db_host: Some("warehouse.test".into()),
        db_name: Some("analytics".into()),
        db_user: Some("admin".into()),
        db_password: Some("admin-pass".into()),
        tenant_secret: Some("secret".into()),
        ..Config::default()
    };
    CredentialResolver::from_config(&config).unwrap()
}

fn cache_with(capacity: usize, idle_timeout: Duration) -> ConnectionCache<MockSession> {
    ConnectionCache::new(
        resolver(),
        CacheOptions {
            capacity,
            idle_timeout,
            connect_timeout: Duration::from_secs(1),
        },
    )
}

fn cache() -> ConnectionCache<MockSession> {
    cache_with(16, Duration::from_secs(3600))
}

fn role_of(tenant: &str) -> String {
    format!("seller_{}", tenant)
}

fn opened_count(tenant: &str) -> u64 {
    script()
        .lock()
        .unwrap()
        .opened
        .get(&role_of(tenant))
        .copied()
        .unwrap_or(0)
}

fn was_closed(id: u64) -> bool {
    script().lock().unwrap().closed.contains(&id)
}

async fn session_id(handle: &Arc<tokio::sync::Mutex<MockSession>>) -> u64 {
    handle.lock().await.id
}

#[tokio::test]
async fn first_get_creates_exactly_one_entry() {
    let cache = cache();
    let tenant = TenantId::new("t-first");

    let handle = cache.get(&tenant).await.unwrap();
    assert_eq!(cache.len().await, 1);
    assert_eq!(opened_count("t-first"), 1);

    // The freshly created session passes a probe.
    assert!(handle.lock().await.probe().await.unwrap());
}

#[tokio::test]
async fn repeated_get_returns_same_handle() {
    let cache = cache();
    let tenant = TenantId::new("t-hit");

    let first = cache.get(&tenant).await.unwrap();
    let second = cache.get(&tenant).await.unwrap();

    // Cache hit is observable by identity, not just by type.
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(opened_count("t-hit"), 1);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn dead_connection_is_replaced() {
    let cache = cache();
    let tenant = TenantId::new("t-dead");

    let first = cache.get(&tenant).await.unwrap();
    let first_id = session_id(&first).await;
    drop(first);

    script()
        .lock()
        .unwrap()
        .dead
        .insert(role_of("t-dead"));
    // New sessions for the role must probe alive again.
    let second = {
        let pending = cache.get(&tenant).await.unwrap();
        script().lock().unwrap().dead.remove(&role_of("t-dead"));
        pending
    };

    let second_id = session_id(&second).await;
    assert_ne!(first_id, second_id, "a new session must be established");
    assert!(was_closed(first_id), "the dead session must be closed");
    assert_eq!(opened_count("t-dead"), 2);
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn probe_error_propagates_without_eviction() {
    let cache = cache();
    let tenant = TenantId::new("t-blip");

    let first = cache.get(&tenant).await.unwrap();

    script()
        .lock()
        .unwrap()
        .probe_error
        .insert(role_of("t-blip"));
    let err = cache.get(&tenant).await.unwrap_err();
    assert!(matches!(err, WarehouseError::Query { .. }));

    // The healthy session must still be cached, not evicted over the blip.
    assert_eq!(cache.len().await, 1);
    script()
        .lock()
        .unwrap()
        .probe_error
        .remove(&role_of("t-blip"));

    let again = cache.get(&tenant).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(opened_count("t-blip"), 1);
}

#[tokio::test]
async fn failed_establishment_leaves_no_entry() {
    let cache = cache();
    let tenant = TenantId::new("t-refused");

    script()
        .lock()
        .unwrap()
        .fail_connect
        .insert(role_of("t-refused"));
    let err = cache.get(&tenant).await.unwrap_err();
    assert!(matches!(err, WarehouseError::Connection { .. }));
    assert_eq!(cache.len().await, 0);

    // A retry is a clean fresh attempt.
    script()
        .lock()
        .unwrap()
        .fail_connect
        .remove(&role_of("t-refused"));
    cache.get(&tenant).await.unwrap();
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn concurrent_gets_for_new_tenant_create_one_entry() {
    let cache = Arc::new(cache());
    let tenant = TenantId::new("t-race");

    let (a, b) = tokio::join!(cache.get(&tenant), cache.get(&tenant));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b), "both callers must see the same session");
    assert_eq!(opened_count("t-race"), 1, "no duplicate connection leaked");
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn invalidate_closes_and_removes() {
    let cache = cache();
    let tenant = TenantId::new("t-invalidate");

    let handle = cache.get(&tenant).await.unwrap();
    let id = session_id(&handle).await;
    drop(handle);

    assert!(cache.invalidate(&tenant).await);
    assert_eq!(cache.len().await, 0);
    assert!(was_closed(id));

    // Nothing left to invalidate.
    assert!(!cache.invalidate(&tenant).await);
}

#[tokio::test]
async fn capacity_evicts_least_recently_used() {
    let cache = cache_with(2, Duration::from_secs(3600));

    let t1 = TenantId::new("t-lru-1");
    let t2 = TenantId::new("t-lru-2");
    let t3 = TenantId::new("t-lru-3");

    let h1 = cache.get(&t1).await.unwrap();
    let id1 = session_id(&h1).await;
    drop(h1);
    drop(cache.get(&t2).await.unwrap());
    // Touch t1 so t2 becomes the least recently used.
    drop(cache.get(&t1).await.unwrap());

    drop(cache.get(&t3).await.unwrap());
    assert_eq!(cache.len().await, 2);
    assert!(!cache.invalidate(&t2).await, "t2 should have been evicted");
    assert!(cache.invalidate(&t1).await);
    assert!(cache.invalidate(&t3).await);
    // id1 belongs to t1's still-live first session; it closed on invalidate.
    assert!(was_closed(id1));
}

#[tokio::test]
async fn idle_sweep_closes_stale_entries() {
    let cache = cache_with(16, Duration::ZERO);

    let t1 = TenantId::new("t-idle-1");
    let t2 = TenantId::new("t-idle-2");
    drop(cache.get(&t1).await.unwrap());
    drop(cache.get(&t2).await.unwrap());
    assert_eq!(cache.len().await, 2);

    let closed = cache.close_idle().await;
    assert_eq!(closed, 2);
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn close_all_empties_the_cache() {
    let cache = cache();

    let t1 = TenantId::new("t-shutdown-1");
    let t2 = TenantId::new("t-shutdown-2");
    let id1 = {
        let h = cache.get(&t1).await.unwrap();
        session_id(&h).await
    };
    let id2 = {
        let h = cache.get(&t2).await.unwrap();
        session_id(&h).await
    };

    cache.close_all().await;
    assert!(cache.is_empty().await);
    assert!(was_closed(id1));
    assert!(was_closed(id2));
}
