//! Bitacora (audit trail) domain model.
//!
//! Entries are append-only: the store exposes no update or delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitacoraEntry {
    pub id: Uuid,
    pub register_id: Uuid,
    /// Acting user; `None` for system-driven pipeline writes.
    pub user_id: Option<Uuid>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBitacoraEntry {
    pub register_id: Uuid,
    pub user_id: Option<Uuid>,
    pub comment: String,
}
