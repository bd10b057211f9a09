//! SurrealDB implementation of [`BitacoraRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::FleetResult;
use fleetwatch_core::models::bitacora::{BitacoraEntry, CreateBitacoraEntry};
use fleetwatch_core::repository::BitacoraRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_optional_uuid, parse_uuid};

#[derive(Debug, SurrealValue)]
struct BitacoraRow {
    register_id: String,
    user_id: Option<String>,
    comment: String,
    created_at: DateTime<Utc>,
}

impl BitacoraRow {
    fn into_entry(self, id: Uuid) -> Result<BitacoraEntry, DbError> {
        Ok(BitacoraEntry {
            id,
            register_id: parse_uuid(&self.register_id, "register")?,
            user_id: parse_optional_uuid(self.user_id.as_deref(), "user")?,
            comment: self.comment,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct BitacoraRowWithId {
    record_id: String,
    register_id: String,
    user_id: Option<String>,
    comment: String,
    created_at: DateTime<Utc>,
}

impl BitacoraRowWithId {
    fn try_into_entry(self) -> Result<BitacoraEntry, DbError> {
        Ok(BitacoraEntry {
            id: parse_uuid(&self.record_id, "bitacora")?,
            register_id: parse_uuid(&self.register_id, "register")?,
            user_id: parse_optional_uuid(self.user_id.as_deref(), "user")?,
            comment: self.comment,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Bitacora repository.
///
/// Entries can be appended and listed, nothing else.
#[derive(Clone)]
pub struct SurrealBitacoraRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBitacoraRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> BitacoraRepository for SurrealBitacoraRepository<C> {
    async fn append(&self, input: CreateBitacoraEntry) -> FleetResult<BitacoraEntry> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('bitacora', $id) SET \
                 register_id = $register_id, \
                 user_id = $user_id, \
                 comment = $comment",
            )
            .bind(("id", id.to_string()))
            .bind(("register_id", input.register_id.to_string()))
            .bind(("user_id", input.user_id.map(|u| u.to_string())))
            .bind(("comment", input.comment))
            .await
            .map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<BitacoraRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "bitacora".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_entry(id)?)
    }

    async fn list_by_register(&self, register_id: Uuid) -> FleetResult<Vec<BitacoraEntry>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM bitacora \
                 WHERE register_id = $register_id ORDER BY created_at DESC",
            )
            .bind(("register_id", register_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BitacoraRowWithId> = result.take(0).map_err(DbError::from)?;
        let entries = rows
            .into_iter()
            .map(BitacoraRowWithId::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(entries)
    }
}
