//! Geofence domain model.
//!
//! Containment is computed by the telemetry provider; locally a geofence
//! is only a unique name vehicles can be attached to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
