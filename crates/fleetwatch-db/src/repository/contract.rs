//! SurrealDB implementation of [`ContractRepository`].

use chrono::{DateTime, Utc};
use fleetwatch_core::error::{FleetError, FleetResult};
use fleetwatch_core::models::contract::{Contract, CreateContract};
use fleetwatch_core::repository::ContractRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct ContractRow {
    contract_id: i64,
    vin: String,
    label: String,
    created_at: DateTime<Utc>,
}

impl ContractRow {
    fn into_contract(self, id: Uuid) -> Contract {
        Contract {
            id,
            contract_id: self.contract_id,
            vin: self.vin,
            label: self.label,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, SurrealValue)]
struct ContractRowWithId {
    record_id: String,
    contract_id: i64,
    vin: String,
    label: String,
    created_at: DateTime<Utc>,
}

impl ContractRowWithId {
    fn try_into_contract(self) -> Result<Contract, DbError> {
        Ok(Contract {
            id: parse_uuid(&self.record_id, "contract")?,
            contract_id: self.contract_id,
            vin: self.vin,
            label: self.label,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Contract repository.
#[derive(Clone)]
pub struct SurrealContractRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealContractRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ContractRepository for SurrealContractRepository<C> {
    async fn create(&self, input: CreateContract) -> FleetResult<Contract> {
        let id = Uuid::new_v4();
        let contract_id = input.contract_id;

        let result = self
            .db
            .query(
                "CREATE type::record('contract', $id) SET \
                 contract_id = $contract_id, \
                 vin = $vin, \
                 label = $label",
            )
            .bind(("id", id.to_string()))
            .bind(("contract_id", input.contract_id))
            .bind(("vin", input.vin.to_uppercase()))
            .bind(("label", input.label))
            .await
            .map_err(DbError::from)?;

        let mut result = match result.check() {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                if message.contains("idx_contract_contract_id") {
                    return Err(FleetError::AlreadyExists {
                        entity: format!("contract {contract_id}"),
                    });
                }
                return Err(DbError::Query(message).into());
            }
        };

        let rows: Vec<ContractRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "contract".into(),
            id: id.to_string(),
        })?;

        Ok(row.into_contract(id))
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Contract> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('contract', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ContractRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "contract".into(),
            id: id_str,
        })?;

        Ok(row.into_contract(id))
    }

    async fn find_by_vin(&self, vin: &str) -> FleetResult<Option<Contract>> {
        // Several contracts may name the same VIN; the newest wins.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM contract \
                 WHERE vin = $vin ORDER BY created_at DESC LIMIT 1",
            )
            .bind(("vin", vin.to_uppercase()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ContractRowWithId> = result.take(0).map_err(DbError::from)?;
        let contract = rows
            .into_iter()
            .next()
            .map(ContractRowWithId::try_into_contract)
            .transpose()?;

        Ok(contract)
    }
}
