//! SurrealDB implementation of [`ClientRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::client::{Client, CreateClient};
use fleetwatch_core::repository::ClientRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct ClientRow {
    external_id: i64,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClientRow {
    fn into_client(self, id: Uuid) -> Client {
        Client {
            id,
            external_id: self.external_id,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ClientRowWithId {
    record_id: String,
    external_id: i64,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ClientRowWithId {
    fn try_into_client(self) -> Result<Client, DbError> {
        Ok(Client {
            id: parse_uuid(&self.record_id, "client")?,
            external_id: self.external_id,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Client repository.
#[derive(Clone)]
pub struct SurrealClientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealClientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Client>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM client \
                 WHERE external_id = $external_id LIMIT 1",
            )
            .bind(("external_id", external_id))
            .await?;

        let rows: Vec<ClientRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(ClientRowWithId::try_into_client)
            .transpose()
    }
}

impl<C: Connection> ClientRepository for SurrealClientRepository<C> {
    async fn get_or_create(&self, input: CreateClient) -> FleetResult<GetOrCreate<Client>> {
        if let Some(existing) = self.find_by_external_id(input.external_id).await? {
            return Ok(GetOrCreate::existing(existing));
        }

        let id = Uuid::new_v4();
        let result = self
            .db
            .query(
                "CREATE type::record('client', $id) SET \
                 external_id = $external_id, \
                 description = $description",
            )
            .bind(("id", id.to_string()))
            .bind(("external_id", input.external_id))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut result) => {
                let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "client".into(),
                    id: id.to_string(),
                })?;
                Ok(GetOrCreate::created(row.into_client(id)))
            }
            Err(e) => {
                // Another writer won the unique index; use its row.
                debug!(external_id = input.external_id, error = %e, "client insert conflicted");
                match self.find_by_external_id(input.external_id).await? {
                    Some(existing) => Ok(GetOrCreate::existing(existing)),
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Client> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('client', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ClientRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "client".into(),
            id: id_str,
        })?;

        Ok(row.into_client(id))
    }

    async fn get_by_external_id(&self, external_id: i64) -> FleetResult<Client> {
        self.find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                DbError::NotFound {
                    entity: "client".into(),
                    id: format!("external_id={external_id}"),
                }
                .into()
            })
    }
}
