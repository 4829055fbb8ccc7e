//! Pool de connexions PostgreSQL

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::debug;

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    #[default]
    Disable,
    Prefer,
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Paramètres de connexion ; l'import est séquentiel, un petit pool suffit
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "persil".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
        }
    }
}

/// Surcharges venant de la ligne de commande
#[derive(Debug, Clone, Default)]
pub struct DatabaseOverrides {
    pub host: Option<String>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub ssl: Option<String>,
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement (PG*, POOL_SIZE)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("PGHOST").unwrap_or(defaults.host),
            port: lookup("PGPORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            dbname: lookup("PGDATABASE").unwrap_or(defaults.dbname),
            user: lookup("PGUSER").unwrap_or(defaults.user),
            password: lookup("PGPASSWORD"),
            pool_size: lookup("POOL_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            ssl_mode: lookup("PGSSLMODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Applique les options CLI par-dessus l'environnement
    pub fn apply(&mut self, overrides: DatabaseOverrides) -> Result<()> {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(database) = overrides.database {
            self.dbname = database;
        }
        if let Some(user) = overrides.user {
            self.user = user;
        }
        if let Some(password) = overrides.password {
            self.password = Some(password);
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(ssl) = overrides.ssl {
            self.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
        }
        Ok(())
    }
}

/// Crée la configuration TLS pour rustls
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Crée un pool de connexions (les connexions sont ouvertes à la demande)
pub async fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.dbname = Some(config.dbname.clone());
    cfg.user = Some(config.user.clone());
    cfg.password = config.password.clone();

    cfg.pool = Some(PoolConfig {
        max_size: config.pool_size,
        timeouts: Timeouts {
            wait: Some(Duration::from_secs(30)),
            create: Some(Duration::from_secs(10)),
            recycle: Some(Duration::from_secs(30)),
        },
        ..Default::default()
    });

    debug!(host = %config.host, dbname = %config.dbname, ssl = ?config.ssl_mode, "Creating pool");
    match config.ssl_mode {
        SslMode::Disable => cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .context("Failed to create database pool"),
        SslMode::Prefer | SslMode::Require => cfg
            .create_pool(Some(Runtime::Tokio1), make_tls_connector())
            .context("Failed to create database pool with TLS"),
    }
}

/// Teste la connexion à la base
pub async fn test_connection(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get connection from pool")?;
    client
        .execute("SELECT 1", &[])
        .await
        .context("Connection test failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("REQUIRE".parse::<SslMode>(), Ok(SslMode::Require));
        assert_eq!("off".parse::<SslMode>(), Ok(SslMode::Disable));
        assert!("verify-full".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("PGHOST", "db.internal"),
            ("PGPORT", "6432"),
            ("PGPASSWORD", "secret"),
            ("POOL_SIZE", "not-a-number"),
            ("PGSSLMODE", "prefer"),
        ]
        .into_iter()
        .collect();

        let config = DatabaseConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6432);
        assert_eq!(config.dbname, "persil");
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.pool_size, 4);
        assert_eq!(config.ssl_mode, SslMode::Prefer);
    }

    #[test]
    fn test_overrides() {
        let mut config = DatabaseConfig::default();
        config
            .apply(DatabaseOverrides {
                database: Some("kadaster".into()),
                port: Some(5433),
                ssl: Some("require".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.dbname, "kadaster");
        assert_eq!(config.port, 5433);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.ssl_mode, SslMode::Require);

        assert!(config
            .apply(DatabaseOverrides {
                ssl: Some("sometimes".into()),
                ..Default::default()
            })
            .is_err());
    }
}
