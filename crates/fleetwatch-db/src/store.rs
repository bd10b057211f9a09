//! The bundled SurrealDB entity store.

use fleetwatch_core::error::FleetResult;
use fleetwatch_core::repository::FleetStore;
use surrealdb::{Connection, Surreal};

use crate::error::DbError;
use crate::repository::{
    SurrealBitacoraRepository, SurrealClientRepository, SurrealContractRepository,
    SurrealDistributorRepository, SurrealGeofenceRepository, SurrealGroupRepository,
    SurrealRegisterRepository, SurrealVehicleRepository,
};

/// Every repository over one shared connection.
#[derive(Clone)]
pub struct SurrealFleetStore<C: Connection> {
    db: Surreal<C>,
    clients: SurrealClientRepository<C>,
    groups: SurrealGroupRepository<C>,
    distributors: SurrealDistributorRepository<C>,
    geofences: SurrealGeofenceRepository<C>,
    contracts: SurrealContractRepository<C>,
    vehicles: SurrealVehicleRepository<C>,
    registers: SurrealRegisterRepository<C>,
    bitacora: SurrealBitacoraRepository<C>,
}

impl<C: Connection> SurrealFleetStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            clients: SurrealClientRepository::new(db.clone()),
            groups: SurrealGroupRepository::new(db.clone()),
            distributors: SurrealDistributorRepository::new(db.clone()),
            geofences: SurrealGeofenceRepository::new(db.clone()),
            contracts: SurrealContractRepository::new(db.clone()),
            vehicles: SurrealVehicleRepository::new(db.clone()),
            registers: SurrealRegisterRepository::new(db.clone()),
            bitacora: SurrealBitacoraRepository::new(db.clone()),
            db,
        }
    }
}

impl<C: Connection> FleetStore for SurrealFleetStore<C> {
    type Clients = SurrealClientRepository<C>;
    type Groups = SurrealGroupRepository<C>;
    type Distributors = SurrealDistributorRepository<C>;
    type Geofences = SurrealGeofenceRepository<C>;
    type Contracts = SurrealContractRepository<C>;
    type Vehicles = SurrealVehicleRepository<C>;
    type Registers = SurrealRegisterRepository<C>;
    type Bitacora = SurrealBitacoraRepository<C>;

    fn clients(&self) -> &Self::Clients {
        &self.clients
    }

    fn groups(&self) -> &Self::Groups {
        &self.groups
    }

    fn distributors(&self) -> &Self::Distributors {
        &self.distributors
    }

    fn geofences(&self) -> &Self::Geofences {
        &self.geofences
    }

    fn contracts(&self) -> &Self::Contracts {
        &self.contracts
    }

    fn vehicles(&self) -> &Self::Vehicles {
        &self.vehicles
    }

    fn registers(&self) -> &Self::Registers {
        &self.registers
    }

    fn bitacora(&self) -> &Self::Bitacora {
        &self.bitacora
    }

    async fn health_check(&self) -> FleetResult<()> {
        self.db
            .query("RETURN true")
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;
        Ok(())
    }
}
