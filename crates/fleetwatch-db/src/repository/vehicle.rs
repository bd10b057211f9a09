//! SurrealDB implementation of [`VehicleRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::vehicle::{UpsertVehicle, Vehicle};
use fleetwatch_core::repository::VehicleRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_optional_uuid, parse_uuid};

#[derive(Debug, SurrealValue)]
struct VehicleRow {
    external_id: i64,
    vin: String,
    group_id: String,
    distributor_id: String,
    geofence_id: Option<String>,
    contract_id: Option<String>,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    last_connection: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VehicleRow {
    fn into_vehicle(self, id: Uuid) -> Result<Vehicle, DbError> {
        Ok(Vehicle {
            id,
            external_id: self.external_id,
            vin: self.vin,
            group_id: parse_uuid(&self.group_id, "group")?,
            distributor_id: parse_uuid(&self.distributor_id, "distributor")?,
            geofence_id: parse_optional_uuid(self.geofence_id.as_deref(), "geofence")?,
            contract_id: parse_optional_uuid(self.contract_id.as_deref(), "contract")?,
            last_latitude: self.last_latitude,
            last_longitude: self.last_longitude,
            last_connection: self.last_connection,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct VehicleRowWithId {
    record_id: String,
    external_id: i64,
    vin: String,
    group_id: String,
    distributor_id: String,
    geofence_id: Option<String>,
    contract_id: Option<String>,
    last_latitude: Option<f64>,
    last_longitude: Option<f64>,
    last_connection: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VehicleRowWithId {
    fn try_into_vehicle(self) -> Result<Vehicle, DbError> {
        let id = parse_uuid(&self.record_id, "vehicle")?;
        VehicleRow {
            external_id: self.external_id,
            vin: self.vin,
            group_id: self.group_id,
            distributor_id: self.distributor_id,
            geofence_id: self.geofence_id,
            contract_id: self.contract_id,
            last_latitude: self.last_latitude,
            last_longitude: self.last_longitude,
            last_connection: self.last_connection,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_vehicle(id)
    }
}

/// SurrealDB implementation of the Vehicle repository.
#[derive(Clone)]
pub struct SurrealVehicleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealVehicleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by_external_id(&self, external_id: i64) -> Result<Option<Vehicle>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM vehicle \
                 WHERE external_id = $external_id LIMIT 1",
            )
            .bind(("external_id", external_id))
            .await?;

        let rows: Vec<VehicleRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(VehicleRowWithId::try_into_vehicle)
            .transpose()
    }

    /// Overwrite the mutable columns of an existing vehicle. Position and
    /// last connection are left alone when the snapshot carries none.
    async fn update_existing(&self, id: Uuid, input: UpsertVehicle) -> Result<Vehicle, DbError> {
        let id_str = id.to_string();

        let mut sets = vec![
            "vin = $vin",
            "group_id = $group_id",
            "distributor_id = $distributor_id",
            "geofence_id = $geofence_id",
            "contract_id = $contract_id",
        ];
        if input.last_latitude.is_some() {
            sets.push("last_latitude = $last_latitude");
        }
        if input.last_longitude.is_some() {
            sets.push("last_longitude = $last_longitude");
        }
        if input.last_connection.is_some() {
            sets.push("last_connection = $last_connection");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('vehicle', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("vin", input.vin))
            .bind(("group_id", input.group_id.to_string()))
            .bind(("distributor_id", input.distributor_id.to_string()))
            .bind(("geofence_id", input.geofence_id.map(|g| g.to_string())))
            .bind(("contract_id", input.contract_id.map(|c| c.to_string())));

        if let Some(latitude) = input.last_latitude {
            builder = builder.bind(("last_latitude", latitude));
        }
        if let Some(longitude) = input.last_longitude {
            builder = builder.bind(("last_longitude", longitude));
        }
        if let Some(last_connection) = input.last_connection {
            builder = builder.bind(("last_connection", last_connection));
        }

        let result = builder.await?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<VehicleRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "vehicle".into(),
            id: id_str,
        })?;

        row.into_vehicle(id)
    }
}

impl<C: Connection> VehicleRepository for SurrealVehicleRepository<C> {
    async fn upsert(&self, input: UpsertVehicle) -> FleetResult<GetOrCreate<Vehicle>> {
        if let Some(existing) = self.find_by_external_id(input.external_id).await? {
            let updated = self.update_existing(existing.id, input).await?;
            return Ok(GetOrCreate::existing(updated));
        }

        let id = Uuid::new_v4();
        let external_id = input.external_id;
        let result = self
            .db
            .query(
                "CREATE type::record('vehicle', $id) SET \
                 external_id = $external_id, \
                 vin = $vin, \
                 group_id = $group_id, \
                 distributor_id = $distributor_id, \
                 geofence_id = $geofence_id, \
                 contract_id = $contract_id, \
                 last_latitude = $last_latitude, \
                 last_longitude = $last_longitude, \
                 last_connection = $last_connection",
            )
            .bind(("id", id.to_string()))
            .bind(("external_id", input.external_id))
            .bind(("vin", input.vin.clone()))
            .bind(("group_id", input.group_id.to_string()))
            .bind(("distributor_id", input.distributor_id.to_string()))
            .bind(("geofence_id", input.geofence_id.map(|g| g.to_string())))
            .bind(("contract_id", input.contract_id.map(|c| c.to_string())))
            .bind(("last_latitude", input.last_latitude))
            .bind(("last_longitude", input.last_longitude))
            .bind(("last_connection", input.last_connection))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(mut result) => {
                let rows: Vec<VehicleRow> = result.take(0).map_err(DbError::from)?;
                let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
                    entity: "vehicle".into(),
                    id: id.to_string(),
                })?;
                Ok(GetOrCreate::created(row.into_vehicle(id)?))
            }
            Err(e) => {
                // Lost the race on external_id: the winner's row gets this
                // snapshot's state instead.
                debug!(external_id, error = %e, "vehicle insert conflicted");
                match self.find_by_external_id(external_id).await? {
                    Some(existing) => {
                        let updated = self.update_existing(existing.id, input).await?;
                        Ok(GetOrCreate::existing(updated))
                    }
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Vehicle> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('vehicle', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VehicleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "vehicle".into(),
            id: id_str,
        })?;

        Ok(row.into_vehicle(id)?)
    }

    async fn get_by_external_id(&self, external_id: i64) -> FleetResult<Vehicle> {
        self.find_by_external_id(external_id)
            .await?
            .ok_or_else(|| {
                DbError::NotFound {
                    entity: "vehicle".into(),
                    id: format!("external_id={external_id}"),
                }
                .into()
            })
    }

    async fn list_by_group(&self, group_id: Uuid) -> FleetResult<Vec<Vehicle>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM vehicle \
                 WHERE group_id = $group_id ORDER BY external_id ASC",
            )
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VehicleRowWithId> = result.take(0).map_err(DbError::from)?;
        let vehicles = rows
            .into_iter()
            .map(VehicleRowWithId::try_into_vehicle)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(vehicles)
    }
}
