//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs and report dates are
//! stored as strings; enums are stored as strings with ASSERT
//! constraints. Every natural key the pipeline resolves by carries a
//! UNIQUE index, which is what makes get-or-create race-free.

use std::collections::BTreeSet;

use surrealdb::{Connection, Surreal};
use tracing::{info, warn};

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 - initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Clients
-- =======================================================================
DEFINE TABLE client SCHEMAFULL;
DEFINE FIELD external_id ON TABLE client TYPE int READONLY;
DEFINE FIELD description ON TABLE client TYPE string;
DEFINE FIELD created_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_client_external_id ON TABLE client \
    COLUMNS external_id UNIQUE;

-- =======================================================================
-- Groups (owned by one client)
-- =======================================================================
DEFINE TABLE vehicle_group SCHEMAFULL;
DEFINE FIELD external_id ON TABLE vehicle_group TYPE int READONLY;
DEFINE FIELD description ON TABLE vehicle_group TYPE string;
DEFINE FIELD client_id ON TABLE vehicle_group TYPE string READONLY;
DEFINE FIELD created_at ON TABLE vehicle_group TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE vehicle_group TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_external_id ON TABLE vehicle_group \
    COLUMNS external_id UNIQUE;
DEFINE INDEX idx_group_client ON TABLE vehicle_group COLUMNS client_id;

-- =======================================================================
-- Distributors
-- =======================================================================
DEFINE TABLE distributor SCHEMAFULL;
DEFINE FIELD external_id ON TABLE distributor TYPE int READONLY;
DEFINE FIELD name ON TABLE distributor TYPE string;
DEFINE FIELD created_at ON TABLE distributor TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE distributor TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_distributor_external_id ON TABLE distributor \
    COLUMNS external_id UNIQUE;

-- =======================================================================
-- Geofences
-- =======================================================================
DEFINE TABLE geofence SCHEMAFULL;
DEFINE FIELD name ON TABLE geofence TYPE string;
DEFINE FIELD created_at ON TABLE geofence TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_geofence_name ON TABLE geofence \
    COLUMNS name UNIQUE;

-- =======================================================================
-- Contracts (loaded out-of-band)
-- =======================================================================
DEFINE TABLE contract SCHEMAFULL;
DEFINE FIELD contract_id ON TABLE contract TYPE int;
DEFINE FIELD vin ON TABLE contract TYPE string;
DEFINE FIELD label ON TABLE contract TYPE string;
DEFINE FIELD created_at ON TABLE contract TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_contract_contract_id ON TABLE contract \
    COLUMNS contract_id UNIQUE;
DEFINE INDEX idx_contract_vin ON TABLE contract COLUMNS vin;

-- =======================================================================
-- Vehicles
-- =======================================================================
DEFINE TABLE vehicle SCHEMAFULL;
DEFINE FIELD external_id ON TABLE vehicle TYPE int READONLY;
DEFINE FIELD vin ON TABLE vehicle TYPE string \
    ASSERT string::len($value) = 17;
DEFINE FIELD group_id ON TABLE vehicle TYPE string;
DEFINE FIELD distributor_id ON TABLE vehicle TYPE string;
DEFINE FIELD geofence_id ON TABLE vehicle TYPE option<string>;
DEFINE FIELD contract_id ON TABLE vehicle TYPE option<string>;
DEFINE FIELD last_latitude ON TABLE vehicle TYPE option<float>;
DEFINE FIELD last_longitude ON TABLE vehicle TYPE option<float>;
DEFINE FIELD last_connection ON TABLE vehicle TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE vehicle TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE vehicle TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_vehicle_external_id ON TABLE vehicle \
    COLUMNS external_id UNIQUE;
DEFINE INDEX idx_vehicle_group ON TABLE vehicle COLUMNS group_id;
DEFINE INDEX idx_vehicle_vin ON TABLE vehicle COLUMNS vin;

-- =======================================================================
-- Registers (one per vehicle per report day)
-- =======================================================================
DEFINE TABLE register SCHEMAFULL;
DEFINE FIELD vehicle_id ON TABLE register TYPE string READONLY;
DEFINE FIELD distributor_id ON TABLE register TYPE string;
DEFINE FIELD report_date ON TABLE register TYPE string READONLY;
DEFINE FIELD last_connection ON TABLE register TYPE datetime;
DEFINE FIELD problem ON TABLE register TYPE string;
DEFINE FIELD disconnection_type ON TABLE register TYPE string \
    ASSERT $value IN ['Route', 'Base'];
DEFINE FIELD status ON TABLE register TYPE string \
    ASSERT $value IN ['PossibleTamper', 'SignalLost', 'Workshop', \
    'PowerCut', 'Base', 'Crashed'];
DEFINE FIELD responsible ON TABLE register TYPE string \
    ASSERT $value IN ['NoDistributorStatus', 'NoClientStatus', \
    'NonOperational', 'PhysicalReview'];
DEFINE FIELD comment ON TABLE register TYPE string DEFAULT '';
DEFINE FIELD platform_client ON TABLE register TYPE string DEFAULT '';
DEFINE FIELD speed ON TABLE register TYPE option<float>;
DEFINE FIELD geofence_name ON TABLE register TYPE option<string>;
DEFINE FIELD created_at ON TABLE register TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE FIELD updated_at ON TABLE register TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_register_vehicle_date ON TABLE register \
    COLUMNS vehicle_id, report_date UNIQUE;
DEFINE INDEX idx_register_report_date ON TABLE register \
    COLUMNS report_date;

-- =======================================================================
-- Bitacora (append-only audit trail)
-- =======================================================================
DEFINE TABLE bitacora SCHEMAFULL;
DEFINE FIELD register_id ON TABLE bitacora TYPE string READONLY;
DEFINE FIELD user_id ON TABLE bitacora TYPE option<string> READONLY;
DEFINE FIELD comment ON TABLE bitacora TYPE string READONLY;
DEFINE FIELD created_at ON TABLE bitacora TYPE datetime \
    DEFAULT time::now() READONLY;
DEFINE INDEX idx_bitacora_register ON TABLE bitacora \
    COLUMNS register_id, created_at;
";

/// Apply every migration not yet recorded in `_migration` and return the
/// versions applied by this call, in order.
///
/// Each migration and its `_migration` row are committed in one
/// transaction. When another process applies the same version first,
/// the unique version index makes our transaction fail; that version is
/// then skipped instead of reported as an error.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<Vec<u32>, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("migration table: {e}")))?;

    let done = applied_versions(db).await?;
    let mut applied = Vec::new();

    for migration in MIGRATIONS.iter().filter(|m| !done.contains(&m.version)) {
        let statement = format!(
            "BEGIN TRANSACTION; {} CREATE _migration SET version = $version, name = $name; \
             COMMIT TRANSACTION;",
            migration.sql
        );
        let outcome = db
            .query(&statement)
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check();

        match outcome {
            Ok(_) => {
                info!(version = migration.version, name = migration.name, "Migration applied");
                applied.push(migration.version);
            }
            Err(e) => {
                if applied_versions(db).await?.contains(&migration.version) {
                    warn!(
                        version = migration.version,
                        "Migration applied concurrently by another process"
                    );
                    continue;
                }
                return Err(DbError::Migration(format!(
                    "v{} '{}': {e}",
                    migration.version, migration.name
                )));
            }
        }
    }

    Ok(applied)
}

async fn applied_versions<C: Connection>(db: &Surreal<C>) -> Result<BTreeSet<u32>, DbError> {
    let mut result = db.query("SELECT VALUE version FROM _migration").await?;
    let versions: Vec<u32> = result.take(0)?;
    Ok(versions.into_iter().collect())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_natural_key_is_unique() {
        for index in [
            "idx_client_external_id",
            "idx_group_external_id",
            "idx_distributor_external_id",
            "idx_geofence_name",
            "idx_vehicle_external_id",
            "idx_register_vehicle_date",
        ] {
            let line = SCHEMA_V1
                .lines()
                .position(|l| l.contains(index))
                .unwrap_or_else(|| panic!("missing index {index}"));
            let definition: String = SCHEMA_V1.lines().skip(line).take(2).collect();
            assert!(definition.contains("UNIQUE"), "{index} must be UNIQUE");
        }
    }
}
