//! SurrealDB implementation of [`GeofenceRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::geofence::Geofence;
use fleetwatch_core::repository::GeofenceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct GeofenceRow {
    name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct GeofenceRowWithId {
    record_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl GeofenceRowWithId {
    fn try_into_geofence(self) -> Result<Geofence, DbError> {
        Ok(Geofence {
            id: parse_uuid(&self.record_id, "geofence")?,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Geofence repository.
#[derive(Clone)]
pub struct SurrealGeofenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGeofenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Geofence>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM geofence \
                 WHERE name = $name LIMIT 1",
            )
            .bind(("name", name.to_string()))
            .await?;

        let rows: Vec<GeofenceRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(GeofenceRowWithId::try_into_geofence)
            .transpose()
    }
}

impl<C: Connection> GeofenceRepository for SurrealGeofenceRepository<C> {
    async fn get_or_create(&self, name: &str) -> FleetResult<GetOrCreate<Geofence>> {
        let name = name.trim();
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok(GetOrCreate::existing(existing));
        }

        let id = Uuid::new_v4();
        let result = self
            .db
            .query("CREATE type::record('geofence', $id) SET name = $name")
            .bind(("id", id.to_string()))
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut result) => {
                let rows: Vec<GeofenceRow> = result.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "geofence".into(),
                    id: id.to_string(),
                })?;
                Ok(GetOrCreate::created(Geofence {
                    id,
                    name: row.name,
                    created_at: row.created_at,
                }))
            }
            Err(e) => {
                debug!(name, error = %e, "geofence insert conflicted");
                match self.find_by_name(name).await? {
                    Some(existing) => Ok(GetOrCreate::existing(existing)),
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_name(&self, name: &str) -> FleetResult<Geofence> {
        let name = name.trim();
        self.find_by_name(name).await?.ok_or_else(|| {
            DbError::NotFound {
                entity: "geofence".into(),
                id: format!("name={name}"),
            }
            .into()
        })
    }
}
