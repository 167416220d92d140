//! Tenant identity and the identity -> tenant directory.
//!
//! The directory is a process-wide snapshot loaded once at startup from the
//! warehouse's seller table; it is read-only afterwards. A restart picks up
//! newly onboarded sellers.

use crate::error::{WarehouseError, WarehouseResult};
use sqlx::{PgConnection, Row};
use std::collections::HashMap;
use tracing::info;

/// Opaque tenant (seller) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Immutable snapshot mapping caller identity (email) to tenant id.
#[derive(Debug, Default)]
pub struct TenantDirectory {
    entries: HashMap<String, TenantId>,
}

impl TenantDirectory {
    /// Build a directory from (identity, tenant) pairs. Identities are
    /// case-folded so lookups are insensitive to mailbox capitalization.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, TenantId)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(identity, tenant)| (normalize_identity(&identity.into()), tenant))
            .collect();
        Self { entries }
    }

    /// Load the snapshot from the directory table over an admin session.
    ///
    /// The table name comes from configuration and is interpolated rather
    /// than bound; it is operator-supplied, not caller-supplied.
    pub async fn load(conn: &mut PgConnection, table: &str) -> WarehouseResult<Self> {
        let sql = format!("SELECT email, seller_id FROM {}", table);
        let rows = sqlx::query(&sql)
            .fetch_all(conn)
            .await
            .map_err(WarehouseError::from)?;

        let mut entries = HashMap::with_capacity(rows.len());
        for row in rows {
            let email: String = row.try_get("email").map_err(WarehouseError::from)?;
            let seller_id: String = row.try_get("seller_id").map_err(WarehouseError::from)?;
            entries.insert(normalize_identity(&email), TenantId::new(seller_id));
        }

        info!(count = entries.len(), table = %table, "Loaded tenant directory");
        Ok(Self { entries })
    }

    /// Resolve a caller identity to its tenant id.
    pub fn resolve(&self, identity: &str) -> WarehouseResult<&TenantId> {
        self.entries
            .get(&normalize_identity(identity))
            .ok_or_else(|| WarehouseError::unknown_tenant(identity))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_identity(identity: &str) -> String {
    identity.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> TenantDirectory {
        TenantDirectory::from_entries([
            ("alice@acme.example", TenantId::new("acme")),
            ("bob@globex.example", TenantId::new("globex")),
        ])
    }

    #[test]
    fn test_resolve_known_identity() {
        let dir = directory();
        assert_eq!(dir.resolve("alice@acme.example").unwrap().as_str(), "acme");
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let dir = directory();
        assert_eq!(
            dir.resolve("Alice@Acme.Example").unwrap().as_str(),
            "acme"
        );
        assert_eq!(
            dir.resolve("  bob@globex.example ").unwrap().as_str(),
            "globex"
        );
    }

    #[test]
    fn test_resolve_unknown_identity() {
        let dir = directory();
        let err = dir.resolve("mallory@evil.example").unwrap_err();
        assert!(matches!(err, WarehouseError::UnknownTenant { .. }));
        assert!(err.to_string().contains("mallory@evil.example"));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TenantDirectory::default();
        assert!(dir.is_empty());
        assert!(dir.resolve("anyone@example.com").is_err());
    }

    #[test]
    fn test_tenant_id_display() {
        let tenant = TenantId::new("acme");
        assert_eq!(tenant.to_string(), "acme");
        assert_eq!(TenantId::from("acme"), tenant);
    }
}
