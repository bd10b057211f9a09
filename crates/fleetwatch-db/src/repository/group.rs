//! SurrealDB implementation of [`GroupRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::group::{CreateGroup, Group};
use fleetwatch_core::repository::GroupRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct GroupRow {
    external_id: i64,
    description: String,
    client_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self, id: Uuid) -> Result<Group, DbError> {
        Ok(Group {
            id,
            external_id: self.external_id,
            description: self.description,
            client_id: parse_uuid(&self.client_id, "client")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    external_id: i64,
    description: String,
    client_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            external_id: self.external_id,
            description: self.description,
            client_id: parse_uuid(&self.client_id, "client")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Group>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM vehicle_group \
                 WHERE external_id = $external_id LIMIT 1",
            )
            .bind(("external_id", external_id))
            .await?;

        let rows: Vec<GroupRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(GroupRowWithId::try_into_group)
            .transpose()
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn get_or_create(&self, input: CreateGroup) -> FleetResult<GetOrCreate<Group>> {
        // An existing group keeps whatever client it was first linked to.
        if let Some(existing) = self.find_by_external_id(input.external_id).await? {
            return Ok(GetOrCreate::existing(existing));
        }

        let id = Uuid::new_v4();
        let result = self
            .db
            .query(
                "CREATE type::record('vehicle_group', $id) SET \
                 external_id = $external_id, \
                 description = $description, \
                 client_id = $client_id",
            )
            .bind(("id", id.to_string()))
            .bind(("external_id", input.external_id))
            .bind(("description", input.description))
            .bind(("client_id", input.client_id.to_string()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut result) => {
                let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "group".into(),
                    id: id.to_string(),
                })?;
                Ok(GetOrCreate::created(row.into_group(id)?))
            }
            Err(e) => {
                debug!(external_id = input.external_id, error = %e, "group insert conflicted");
                match self.find_by_external_id(input.external_id).await? {
                    Some(existing) => Ok(GetOrCreate::existing(existing)),
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('vehicle_group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id)?)
    }

    async fn get_by_external_id(&self, external_id: i64) -> FleetResult<Group> {
        self.find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                DbError::NotFound {
                    entity: "group".into(),
                    id: format!("external_id={external_id}"),
                }
                .into()
            })
    }

    async fn update_description(&self, id: Uuid, description: String) -> FleetResult<Group> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('vehicle_group', $id) SET \
                 description = $description, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("description", description))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row.into_group(id)?)
    }

    async fn list(&self) -> FleetResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM vehicle_group \
                 ORDER BY description ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        let groups = rows
            .into_iter()
            .map(GroupRowWithId::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(groups)
    }
}
