//! Domain models for fleetwatch.
//!
//! The organizational hierarchy is client → group → vehicle, with each
//! vehicle also attached to a distributor. Registers record one
//! disconnection per vehicle per report day and carry an append-only
//! bitacora (audit trail).

pub mod bitacora;
pub mod client;
pub mod contract;
pub mod distributor;
pub mod geofence;
pub mod group;
pub mod register;
pub mod snapshot;
pub mod vehicle;

/// Result of a get-or-create style store operation.
#[derive(Debug, Clone)]
pub struct GetOrCreate<T> {
    pub item: T,
    /// `true` when this call inserted the row.
    pub created: bool,
}

impl<T> GetOrCreate<T> {
    pub fn created(item: T) -> Self {
        Self {
            item,
            created: true,
        }
    }

    pub fn existing(item: T) -> Self {
        Self {
            item,
            created: false,
        }
    }
}
