//! Distributor domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External id of the sentinel distributor used when a snapshot names none.
pub const UNKNOWN_DISTRIBUTOR_ID: i64 = 0;

/// Name of the sentinel distributor.
pub const UNKNOWN_DISTRIBUTOR_NAME: &str = "Sin Distribuidor";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distributor {
    pub id: Uuid,
    pub external_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Distributor {
    pub fn is_unknown(&self) -> bool {
        self.external_id == UNKNOWN_DISTRIBUTOR_ID
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDistributor {
    pub external_id: i64,
    pub name: String,
}

impl CreateDistributor {
    /// The global "unknown distributor" sentinel.
    pub fn unknown() -> Self {
        Self {
            external_id: UNKNOWN_DISTRIBUTOR_ID,
            name: UNKNOWN_DISTRIBUTOR_NAME.into(),
        }
    }
}
