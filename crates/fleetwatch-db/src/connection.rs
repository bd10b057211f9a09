//! Connection to the entity store.
//!
//! The ETL binary is started by a scheduler, often right after the
//! database container, so the initial connection is retried a few times
//! before giving up.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

use crate::error::DbError;
use crate::schema::run_migrations;
use crate::store::SurrealFleetStore;

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket address, e.g. `127.0.0.1:8000`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Connection attempts before failing (default: 3).
    pub connect_attempts: u32,
    /// Pause between attempts (default: 2 s).
    pub retry_delay: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "fleetwatch".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            connect_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// An authenticated connection scoped to the fleetwatch namespace and
/// database.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::try_connect(config).await {
                Ok(manager) => return Ok(manager),
                Err(e) if attempt < attempts => {
                    warn!(
                        url = %config.url,
                        attempt,
                        attempts,
                        error = %e,
                        "Entity store unreachable, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connected to entity store"
        );
        Ok(Self { db })
    }

    /// Apply pending schema migrations; returns the versions applied.
    pub async fn migrate(&self) -> Result<Vec<u32>, DbError> {
        run_migrations(&self.db).await
    }

    /// Entity store backed by this connection.
    pub fn store(&self) -> SurrealFleetStore<Client> {
        SurrealFleetStore::new(self.db.clone())
    }
}
