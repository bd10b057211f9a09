//! Entity resolution: external identifiers in a snapshot to store rows.
//!
//! Every lookup is a get-or-create against the store, whose unique keys
//! make the creation race-free. A run-scoped cache skips repeat lookups
//! for the same external id within one run; it is never shared between
//! runs.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fleetwatch_core::error::{FleetError, FleetResult};
use fleetwatch_core::models::client::CreateClient;
use fleetwatch_core::models::distributor::{CreateDistributor, Distributor};
use fleetwatch_core::models::group::{CreateGroup, Group};
use fleetwatch_core::models::vehicle::{UpsertVehicle, Vehicle};
use fleetwatch_core::repository::{
    ClientRepository, ContractRepository, DistributorRepository, FleetStore, GeofenceRepository,
    GroupRepository, VehicleRepository,
};
use tracing::debug;
use uuid::Uuid;

use crate::config::RulesConfig;
use crate::rules;
use crate::validation::ValidSnapshot;

/// Which entities a single resolution created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Created {
    pub client: bool,
    pub group: bool,
    pub distributor: bool,
    pub geofence: bool,
    pub vehicle: bool,
}

/// Outcome of resolving one snapshot.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub vehicle: Vehicle,
    pub group: Group,
    pub distributor: Distributor,
    /// Trimmed geofence name, `None` when outside every geofence.
    pub geofence_name: Option<String>,
    /// Parsed last communication, `None` when missing or unreadable.
    pub last_connection: Option<DateTime<Utc>>,
    pub created: Created,
}

pub struct EntityResolver<'a, S: FleetStore> {
    store: &'a S,
    rules: &'a RulesConfig,
    clients: DashMap<i64, Uuid>,
    groups: DashMap<i64, Group>,
    distributors: DashMap<i64, Distributor>,
    geofences: DashMap<String, Uuid>,
}

impl<'a, S: FleetStore> EntityResolver<'a, S> {
    pub fn new(store: &'a S, rules: &'a RulesConfig) -> Self {
        Self {
            store,
            rules,
            clients: DashMap::new(),
            groups: DashMap::new(),
            distributors: DashMap::new(),
            geofences: DashMap::new(),
        }
    }

    /// Resolve client, group, distributor, geofence and contract, then
    /// upsert the vehicle.
    pub async fn resolve(&self, record: &ValidSnapshot) -> FleetResult<Resolution> {
        let snap = &record.snapshot;
        let mut created = Created::default();

        let client_external = snap.client_id.ok_or_else(|| {
            FleetError::Resolution(format!("vehicle {} has no client_id", record.vehicle_id))
        })?;
        let group_external = snap.group_id.ok_or_else(|| {
            FleetError::Resolution(format!("vehicle {} has no group_id", record.vehicle_id))
        })?;

        let client_id = self
            .client(client_external, snap.client_name.as_deref(), &mut created)
            .await?;
        let group = self
            .group(group_external, snap.group_name.as_deref(), client_id, &mut created)
            .await?;
        let distributor = self
            .distributor(snap.distributor_id, snap.distributor_name.as_deref(), &mut created)
            .await?;

        let geofence_name =
            rules::geofence_name(snap.geofence_name.as_deref(), &self.rules.outside_geofence_label);
        let geofence_id = match geofence_name {
            Some(name) => Some(self.geofence(name, &mut created).await?),
            None => None,
        };

        let contract_id = self
            .store
            .contracts()
            .find_by_vin(&record.vin)
            .await?
            .map(|c| c.id);

        let last_connection = snap
            .last_communication_time
            .as_deref()
            .and_then(|raw| rules::parse_timestamp(raw, self.rules.offset()));

        let upserted = self
            .store
            .vehicles()
            .upsert(UpsertVehicle {
                external_id: record.vehicle_id,
                vin: record.vin.clone(),
                group_id: group.id,
                distributor_id: distributor.id,
                geofence_id,
                contract_id,
                last_latitude: snap.latitude,
                last_longitude: snap.longitude,
                last_connection,
            })
            .await?;
        created.vehicle = upserted.created;

        Ok(Resolution {
            vehicle: upserted.item,
            group,
            distributor,
            geofence_name: geofence_name.map(str::to_string),
            last_connection,
            created,
        })
    }

    async fn client(
        &self,
        external_id: i64,
        name: Option<&str>,
        created: &mut Created,
    ) -> FleetResult<Uuid> {
        if let Some(id) = self.clients.get(&external_id) {
            return Ok(*id);
        }

        let result = self
            .store
            .clients()
            .get_or_create(CreateClient::from_snapshot(external_id, name))
            .await?;
        if result.created {
            debug!(external_id, "Client created");
        }
        created.client = result.created;
        self.clients.insert(external_id, result.item.id);
        Ok(result.item.id)
    }

    async fn group(
        &self,
        external_id: i64,
        name: Option<&str>,
        client_id: Uuid,
        created: &mut Created,
    ) -> FleetResult<Group> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        let cached = self.groups.get(&external_id).map(|g| g.clone());
        let group = match cached {
            Some(group) => group,
            None => {
                let result = self
                    .store
                    .groups()
                    .get_or_create(CreateGroup {
                        external_id,
                        description: name
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Grupo {external_id}")),
                        client_id,
                    })
                    .await?;
                if result.created {
                    debug!(external_id, "Group created");
                }
                created.group = result.created;
                result.item
            }
        };

        // Only the description is ever corrected; the client link stays.
        let group = match name {
            Some(name) if name != group.description => {
                debug!(external_id, old = %group.description, new = name, "Group renamed");
                self.store
                    .groups()
                    .update_description(group.id, name.to_string())
                    .await?
            }
            _ => group,
        };

        self.groups.insert(external_id, group.clone());
        Ok(group)
    }

    async fn distributor(
        &self,
        external_id: Option<i64>,
        name: Option<&str>,
        created: &mut Created,
    ) -> FleetResult<Distributor> {
        let input = match external_id {
            Some(external_id) => CreateDistributor {
                external_id,
                name: name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Distribuidor {external_id}")),
            },
            None => CreateDistributor::unknown(),
        };

        if let Some(distributor) = self.distributors.get(&input.external_id) {
            return Ok(distributor.clone());
        }

        let external_id = input.external_id;
        let result = self.store.distributors().get_or_create(input).await?;
        created.distributor = result.created;
        self.distributors.insert(external_id, result.item.clone());
        Ok(result.item)
    }

    async fn geofence(&self, name: &str, created: &mut Created) -> FleetResult<Uuid> {
        if let Some(id) = self.geofences.get(name) {
            return Ok(*id);
        }

        let result = self.store.geofences().get_or_create(name).await?;
        created.geofence = result.created;
        self.geofences.insert(name.to_string(), result.item.id);
        Ok(result.item.id)
    }
}
