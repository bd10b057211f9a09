//! SurrealDB implementation of [`DistributorRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::distributor::{CreateDistributor, Distributor};
use fleetwatch_core::repository::DistributorRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct DistributorRow {
    external_id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DistributorRow {
    fn into_distributor(self, id: Uuid) -> Distributor {
        Distributor {
            id,
            external_id: self.external_id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct DistributorRowWithId {
    record_id: String,
    external_id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DistributorRowWithId {
    fn try_into_distributor(self) -> Result<Distributor, DbError> {
        Ok(Distributor {
            id: parse_uuid(&self.record_id, "distributor")?,
            external_id: self.external_id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Distributor repository.
#[derive(Clone)]
pub struct SurrealDistributorRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealDistributorRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Distributor>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM distributor \
                 WHERE external_id = $external_id LIMIT 1",
            )
            .bind(("external_id", external_id))
            .await?;

        let rows: Vec<DistributorRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(DistributorRowWithId::try_into_distributor)
            .transpose()
    }
}

impl<C: Connection> DistributorRepository for SurrealDistributorRepository<C> {
    async fn get_or_create(
        &self,
        input: CreateDistributor,
    ) -> FleetResult<GetOrCreate<Distributor>> {
        if let Some(existing) = self.find_by_external_id(input.external_id).await? {
            return Ok(GetOrCreate::existing(existing));
        }

        let id = Uuid::new_v4();
        let result = self
            .db
            .query(
                "CREATE type::record('distributor', $id) SET \
                 external_id = $external_id, \
                 name = $name",
            )
            .bind(("id", id.to_string()))
            .bind(("external_id", input.external_id))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut result) => {
                let rows: Vec<DistributorRow> = result.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "distributor".into(),
                    id: id.to_string(),
                })?;
                Ok(GetOrCreate::created(row.into_distributor(id)))
            }
            Err(e) => {
                debug!(external_id = input.external_id, error = %e, "distributor insert conflicted");
                match self.find_by_external_id(input.external_id).await? {
                    Some(existing) => Ok(GetOrCreate::existing(existing)),
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Distributor> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('distributor', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<DistributorRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "distributor".into(),
            id: id_str,
        })?;

        Ok(row.into_distributor(id))
    }

    async fn get_by_external_id(&self, external_id: i64) -> FleetResult<Distributor> {
        self.find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                DbError::NotFound {
                    entity: "distributor".into(),
                    id: format!("external_id={external_id}"),
                }
                .into()
            })
    }
}
