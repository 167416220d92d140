//! Tenant-scoped credential resolution.
//!
//! Resolution is a pure function of configuration plus tenant id: the
//! per-tenant role name comes from a deterministic template and is paired
//! with a shared secret. Whether the derived role actually exists is not
//! checked here; a missing role surfaces as a connection failure.

use crate::config::Config;
use crate::error::{WarehouseError, WarehouseResult};
use crate::tenant::TenantId;
use sqlx::postgres::PgConnectOptions;

const TENANT_PLACEHOLDER: &str = "{tenant}";

/// A resolved credential set for one warehouse session.
#[derive(Clone)]
pub struct Credentials {
    pub role: String,
    pub secret: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl Credentials {
    /// Build driver connect options from this credential set.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.role)
            .password(&self.secret)
            .application_name("warehouse-mcp-server")
    }
}

// Manual Debug keeps the secret out of logs and panics.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("role", &self.role)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("secret", &"****")
            .finish()
    }
}

/// How tenant sessions are credentialed.
#[derive(Debug, Clone)]
enum CredentialMode {
    /// Primary contract: a derived role per tenant plus a shared secret.
    PerTenant { template: String, secret: String },
    /// Degraded fallback: every tenant session uses the admin credentials.
    SharedAdmin,
}

/// Resolves tenant identities to warehouse credentials.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    host: String,
    port: u16,
    database: String,
    admin_user: String,
    admin_password: String,
    mode: CredentialMode,
}

impl CredentialResolver {
    /// Validate configuration and build a resolver. Missing required values
    /// fail here, at startup, with a message naming the variable.
    pub fn from_config(config: &Config) -> WarehouseResult<Self> {
        let host = required(&config.db_host, "DB_HOST")?;
        let database = required(&config.db_name, "DB_NAME")?;
        let admin_user = required(&config.db_user, "DB_USER")?;
        let admin_password = required(&config.db_password, "DB_PASSWORD")?;

        let mode = if config.shared_admin {
            CredentialMode::SharedAdmin
        } else {
            let secret = required(&config.tenant_secret, "TENANT_DB_SECRET")?;
            let template = config.tenant_role_template.clone();
            if !template.contains(TENANT_PLACEHOLDER) {
                return Err(WarehouseError::configuration(format!(
                    "tenant role template '{}' is missing the {} placeholder",
                    template, TENANT_PLACEHOLDER
                )));
            }
            CredentialMode::PerTenant { template, secret }
        };

        Ok(Self {
            host,
            port: config.db_port,
            database,
            admin_user,
            admin_password,
            mode,
        })
    }

    /// Resolve credentials for a tenant session.
    pub fn resolve(&self, tenant: &TenantId) -> Credentials {
        let (role, secret) = match &self.mode {
            CredentialMode::PerTenant { template, secret } => (
                template.replace(TENANT_PLACEHOLDER, tenant.as_str()),
                secret.clone(),
            ),
            CredentialMode::SharedAdmin => {
                (self.admin_user.clone(), self.admin_password.clone())
            }
        };
        Credentials {
            role,
            secret,
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
        }
    }

    /// Resolve the fixed administrative credentials (directory loading).
    pub fn resolve_admin(&self) -> Credentials {
        Credentials {
            role: self.admin_user.clone(),
            secret: self.admin_password.clone(),
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
        }
    }

    /// True when running in the degraded shared-admin mode.
    pub fn is_shared_admin(&self) -> bool {
        matches!(self.mode, CredentialMode::SharedAdmin)
    }
}

fn required(value: &Option<String>, name: &str) -> WarehouseResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(WarehouseError::configuration(format!(
            "required configuration {} is not set",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> Config {
        Config {
            db_host: Some("warehouse.internal".into()),
            db_name: Some("analytics".into()),
            db_user: Some("admin".into()),
            db_password: Some("admin-pass".into()),
            tenant_secret: Some("tenant-secret".into()),
            ..Config::default()
        }
    }

    #[test]
    fn test_resolve_derives_role_from_template() {
        let resolver = CredentialResolver::from_config(&full_config()).unwrap();
        let creds = resolver.resolve(&TenantId::new("acme"));
        assert_eq!(creds.role, "seller_acme");
        assert_eq!(creds.secret, "tenant-secret");
        assert_eq!(creds.database, "analytics");
        assert!(!resolver.is_shared_admin());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = CredentialResolver::from_config(&full_config()).unwrap();
        let a = resolver.resolve(&TenantId::new("globex"));
        let b = resolver.resolve(&TenantId::new("globex"));
        assert_eq!(a.role, b.role);
        assert_eq!(a.role, "seller_globex");
    }

    #[test]
    fn test_custom_template() {
        let config = Config {
            tenant_role_template: "wh_{tenant}_ro".into(),
            ..full_config()
        };
        let resolver = CredentialResolver::from_config(&config).unwrap();
        assert_eq!(resolver.resolve(&TenantId::new("acme")).role, "wh_acme_ro");
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let config = Config {
            tenant_role_template: "static_role".into(),
            ..full_config()
        };
        let err = CredentialResolver::from_config(&config).unwrap_err();
        assert!(matches!(err, WarehouseError::Configuration { .. }));
        assert!(err.to_string().contains("{tenant}"));
    }

    #[test]
    fn test_missing_host_fails_fast() {
        let config = Config {
            db_host: None,
            ..full_config()
        };
        let err = CredentialResolver::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("DB_HOST"));
    }

    #[test]
    fn test_missing_secret_fails_in_per_tenant_mode() {
        let config = Config {
            tenant_secret: None,
            ..full_config()
        };
        let err = CredentialResolver::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("TENANT_DB_SECRET"));
    }

    #[test]
    fn test_shared_admin_mode_skips_secret() {
        let config = Config {
            tenant_secret: None,
            shared_admin: true,
            ..full_config()
        };
        let resolver = CredentialResolver::from_config(&config).unwrap();
        assert!(resolver.is_shared_admin());
        let creds = resolver.resolve(&TenantId::new("acme"));
        assert_eq!(creds.role, "admin");
        assert_eq!(creds.secret, "admin-pass");
    }

    #[test]
    fn test_admin_credentials() {
        let resolver = CredentialResolver::from_config(&full_config()).unwrap();
        let creds = resolver.resolve_admin();
        assert_eq!(creds.role, "admin");
        assert_eq!(creds.host, "warehouse.internal");
    }

    #[test]
    fn test_debug_masks_secret() {
        let resolver = CredentialResolver::from_config(&full_config()).unwrap();
        let creds = resolver.resolve(&TenantId::new("acme"));
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("tenant-secret"));
        assert!(rendered.contains("****"));
    }
}
