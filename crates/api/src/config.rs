//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 480;
const DEV_JWT_SECRET: &str = "dev-secret";

/// Administrator seeded at startup when no user holds its email yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Reference data optionally loaded from a JSON seed file.
    InMemory { seed_file: Option<PathBuf> },
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub store: StoreConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:8080")?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .context("TOKEN_TTL_MINUTES must be an integer")?,
            None => DEFAULT_TOKEN_TTL_MINUTES,
        };
        if ttl_minutes <= 0 {
            bail!("TOKEN_TTL_MINUTES must be positive");
        }

        let use_persistent = lookup("USE_PERSISTENT_STORES")
            .map(|v| v.parse::<bool>().unwrap_or(false))
            .unwrap_or(false);

        let store = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
            StoreConfig::Postgres { database_url }
        } else {
            StoreConfig::InMemory {
                seed_file: lookup("PORTAL_SEED_FILE").map(PathBuf::from),
            }
        };

        let bootstrap_admin = match (lookup("BOOTSTRAP_ADMIN_EMAIL"), lookup("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (Some(_), None) | (None, Some(_)) => {
                bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together")
            }
            (None, None) => None,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            store,
            bootstrap_admin,
        })
    }
}
