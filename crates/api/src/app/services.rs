//! Service wiring: store selection and token issuance.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cardioportal_auth::{Hs256JwtValidator, JwtClaims, TokenValidationError};
use cardioportal_infra::{InMemoryPortalStore, PostgresPortalStore};
use cardioportal_portal::{PortalService, PortalStore, User};

use crate::config::{AppConfig, StoreConfig};

pub type DynPortalStore = Arc<dyn PortalStore>;

pub struct AppServices {
    pub portal: PortalService<DynPortalStore>,
    jwt: Arc<Hs256JwtValidator>,
    token_ttl: chrono::Duration,
}

impl AppServices {
    pub fn new(store: DynPortalStore, jwt: Arc<Hs256JwtValidator>, token_ttl: chrono::Duration) -> Self {
        Self {
            portal: PortalService::new(store),
            jwt,
            token_ttl,
        }
    }

    /// Sign a session token carrying the user's grant.
    pub fn issue_token(&self, user: &User) -> Result<(String, DateTime<Utc>), TokenValidationError> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = JwtClaims {
            sub: user.id,
            email: user.email.clone(),
            access_type: user.access_kind.as_str().to_string(),
            access_id: user.access_id.clone(),
            permissions: user.permissions,
            issued_at: now,
            expires_at,
        };
        Ok((self.jwt.issue(&claims)?, expires_at))
    }
}

pub async fn build_store(config: &StoreConfig) -> anyhow::Result<DynPortalStore> {
    match config {
        StoreConfig::InMemory { seed_file } => {
            let store = match seed_file {
                Some(path) => InMemoryPortalStore::from_seed_file(path)?,
                None => {
                    tracing::warn!("no PORTAL_SEED_FILE set; reference data is empty");
                    InMemoryPortalStore::new()
                }
            };
            Ok(Arc::new(store))
        }
        StoreConfig::Postgres { database_url } => {
            let pool = PgPool::connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            let store = PostgresPortalStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to prepare portal schema")?;
            tracing::info!("using Postgres portal store");
            Ok(Arc::new(store))
        }
    }
}

pub async fn build_services(config: &AppConfig, jwt: Arc<Hs256JwtValidator>) -> anyhow::Result<AppServices> {
    let store = build_store(&config.store).await?;
    let services = AppServices::new(store, jwt, config.token_ttl);

    if let Some(admin) = &config.bootstrap_admin {
        let created = services
            .portal
            .bootstrap_admin(&admin.email, &admin.password)
            .await
            .context("failed to bootstrap administrator")?;
        if created.is_none() {
            tracing::debug!("bootstrap administrator already present");
        }
    }

    Ok(services)
}
