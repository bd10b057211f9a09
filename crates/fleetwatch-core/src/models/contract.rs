//! Contract domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Associates a VIN with a commercial contract. Contracts are loaded
/// out-of-band; the pipeline only looks them up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub contract_id: i64,
    pub vin: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContract {
    pub contract_id: i64,
    pub vin: String,
    pub label: String,
}
