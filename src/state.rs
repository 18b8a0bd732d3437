use std::sync::Arc;

use anyhow::Context;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::CredentialHasher;
use crate::config::{AppConfig, StoreConfig};
use crate::store::{MemoryStore, PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub keys: Arc<JwtKeys>,
    pub hasher: CredentialHasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.store {
            StoreConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let pg = PgStore::connect(database_url, *max_connections).await?;
                sqlx::migrate!("./migrations")
                    .run(pg.pool())
                    .await
                    .context("run migrations")?;
                tracing::info!("database migrations applied");
                Arc::new(pg) as Arc<dyn Store>
            }
            StoreConfig::Memory => {
                tracing::warn!("using in-memory store; data is lost on shutdown");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Self::from_parts(store, config)
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let keys = Arc::new(JwtKeys::from_config(&config.jwt));
        let hasher = CredentialHasher::new(&config.hashing)?;
        Ok(Self {
            store,
            config,
            keys,
            hasher,
        })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(AppConfig::test_config()),
        )
        .expect("test config is valid")
    }
}
