//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Get-or-create operations must be
//! atomic with respect to the entity's unique key: concurrent callers for
//! the same key observe one row, and exactly one of them sees
//! `created = true`.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::FleetResult;
use crate::models::{
    GetOrCreate,
    bitacora::{BitacoraEntry, CreateBitacoraEntry},
    client::{Client, CreateClient},
    contract::{Contract, CreateContract},
    distributor::{CreateDistributor, Distributor},
    geofence::Geofence,
    group::{CreateGroup, Group},
    register::{CreateRegister, Register, UpdateRegister},
    vehicle::{UpsertVehicle, Vehicle},
};

// ---------------------------------------------------------------------------
// Organization hierarchy
// ---------------------------------------------------------------------------

pub trait ClientRepository: Send + Sync {
    fn get_or_create(
        &self,
        input: CreateClient,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Client>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Client>> + Send;
    fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = FleetResult<Client>> + Send;
}

pub trait GroupRepository: Send + Sync {
    /// Get-or-create by external id. An existing group keeps its client
    /// link even when `input.client_id` differs.
    fn get_or_create(
        &self,
        input: CreateGroup,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Group>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Group>> + Send;
    fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = FleetResult<Group>> + Send;
    fn update_description(
        &self,
        id: Uuid,
        description: String,
    ) -> impl Future<Output = FleetResult<Group>> + Send;
    fn list(&self) -> impl Future<Output = FleetResult<Vec<Group>>> + Send;
}

pub trait DistributorRepository: Send + Sync {
    fn get_or_create(
        &self,
        input: CreateDistributor,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Distributor>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Distributor>> + Send;
    fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = FleetResult<Distributor>> + Send;
}

pub trait GeofenceRepository: Send + Sync {
    fn get_or_create(
        &self,
        name: &str,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Geofence>>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = FleetResult<Geofence>> + Send;
}

pub trait ContractRepository: Send + Sync {
    fn create(&self, input: CreateContract) -> impl Future<Output = FleetResult<Contract>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Contract>> + Send;
    /// Read-only lookup; `Ok(None)` when the VIN has no contract.
    fn find_by_vin(&self, vin: &str)
    -> impl Future<Output = FleetResult<Option<Contract>>> + Send;
}

// ---------------------------------------------------------------------------
// Vehicles
// ---------------------------------------------------------------------------

pub trait VehicleRepository: Send + Sync {
    /// Insert or update keyed by `external_id`.
    fn upsert(
        &self,
        input: UpsertVehicle,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Vehicle>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Vehicle>> + Send;
    fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> impl Future<Output = FleetResult<Vehicle>> + Send;
    fn list_by_group(&self, group_id: Uuid)
    -> impl Future<Output = FleetResult<Vec<Vehicle>>> + Send;
}

// ---------------------------------------------------------------------------
// Registers and audit trail
// ---------------------------------------------------------------------------

pub trait RegisterRepository: Send + Sync {
    /// Atomically insert the register together with its creation audit
    /// entry, unless a register already exists for
    /// `(input.vehicle_id, input.report_date)`. In that case nothing is
    /// written and the existing register is returned with
    /// `created = false`. `audit.register_id` is ignored; the entry is
    /// linked to the new register.
    fn create_if_absent(
        &self,
        input: CreateRegister,
        audit: CreateBitacoraEntry,
    ) -> impl Future<Output = FleetResult<GetOrCreate<Register>>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FleetResult<Register>> + Send;
    fn find_by_vehicle_and_date(
        &self,
        vehicle_id: Uuid,
        report_date: NaiveDate,
    ) -> impl Future<Output = FleetResult<Option<Register>>> + Send;
    fn list_by_vehicle(
        &self,
        vehicle_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<Register>>> + Send;
    /// Registers whose report date lies in `[start, end]`.
    fn list_by_report_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = FleetResult<Vec<Register>>> + Send;
    /// Atomically apply `changes` and append `audit`, provided the stored
    /// editable fields still equal those of `expected`. Otherwise nothing
    /// is written and the call fails with [`FleetError::Conflict`]
    /// (or `NotFound` when the register is gone). Callers are expected
    /// to pass only fields that actually change.
    ///
    /// [`FleetError::Conflict`]: crate::error::FleetError::Conflict
    fn apply_update(
        &self,
        expected: &Register,
        changes: UpdateRegister,
        audit: CreateBitacoraEntry,
    ) -> impl Future<Output = FleetResult<Register>> + Send;
}

pub trait BitacoraRepository: Send + Sync {
    fn append(
        &self,
        input: CreateBitacoraEntry,
    ) -> impl Future<Output = FleetResult<BitacoraEntry>> + Send;
    /// Entries for one register, newest first.
    fn list_by_register(
        &self,
        register_id: Uuid,
    ) -> impl Future<Output = FleetResult<Vec<BitacoraEntry>>> + Send;
}

// ---------------------------------------------------------------------------
// Store bundle
// ---------------------------------------------------------------------------

/// The entity store as one handle, so services can be generic over a
/// single type parameter instead of one per repository.
pub trait FleetStore: Send + Sync {
    type Clients: ClientRepository;
    type Groups: GroupRepository;
    type Distributors: DistributorRepository;
    type Geofences: GeofenceRepository;
    type Contracts: ContractRepository;
    type Vehicles: VehicleRepository;
    type Registers: RegisterRepository;
    type Bitacora: BitacoraRepository;

    fn clients(&self) -> &Self::Clients;
    fn groups(&self) -> &Self::Groups;
    fn distributors(&self) -> &Self::Distributors;
    fn geofences(&self) -> &Self::Geofences;
    fn contracts(&self) -> &Self::Contracts;
    fn vehicles(&self) -> &Self::Vehicles;
    fn registers(&self) -> &Self::Registers;
    fn bitacora(&self) -> &Self::Bitacora;

    /// Cheap round-trip used to detect an unreachable store between batches.
    fn health_check(&self) -> impl Future<Output = FleetResult<()>> + Send;
}
