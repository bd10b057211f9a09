//! Vehicle domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    /// Provider vehicle id, the upsert key.
    pub external_id: i64,
    pub vin: String,
    pub group_id: Uuid,
    pub distributor_id: Uuid,
    pub geofence_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_connection: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full vehicle state derived from one snapshot.
///
/// Coordinates and `last_connection` are only written when present so a
/// snapshot without a position does not erase the last known one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertVehicle {
    pub external_id: i64,
    pub vin: String,
    pub group_id: Uuid,
    pub distributor_id: Uuid,
    pub geofence_id: Option<Uuid>,
    pub contract_id: Option<Uuid>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub last_connection: Option<DateTime<Utc>>,
}
