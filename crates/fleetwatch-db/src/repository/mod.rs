//! SurrealDB repository implementations.

mod bitacora;
mod client;
mod contract;
mod distributor;
mod geofence;
mod group;
mod register;
mod vehicle;

pub use bitacora::SurrealBitacoraRepository;
pub use client::SurrealClientRepository;
pub use contract::SurrealContractRepository;
pub use distributor::SurrealDistributorRepository;
pub use geofence::SurrealGeofenceRepository;
pub use group::SurrealGroupRepository;
pub use register::SurrealRegisterRepository;
pub use vehicle::SurrealVehicleRepository;
