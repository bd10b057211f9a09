//! SurrealDB implementation of [`RegisterRepository`].
//!
//! Register writes and their audit entries go through one transaction so
//! a register never exists without the entry that explains it.

use chrono::{DateTime, NaiveDate, Utc};
use fleetwatch_core::error::{FleetError, FleetResult};
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::bitacora::CreateBitacoraEntry;
use fleetwatch_core::models::register::{
    CreateRegister, DisconnectionType, Register, RegisterStatus, Responsible, UpdateRegister,
};
use fleetwatch_core::repository::RegisterRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DbError::Conversion(format!("invalid report_date '{s}': {e}")))
}

fn parse_disconnection_type(s: &str) -> Result<DisconnectionType, DbError> {
    match s {
        "Route" => Ok(DisconnectionType::Route),
        "Base" => Ok(DisconnectionType::Base),
        other => Err(DbError::Conversion(format!(
            "unknown disconnection type: {other}"
        ))),
    }
}

fn parse_status(s: &str) -> Result<RegisterStatus, DbError> {
    RegisterStatus::ALL
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| DbError::Conversion(format!("unknown register status: {s}")))
}

fn parse_responsible(s: &str) -> Result<Responsible, DbError> {
    match s {
        "NoDistributorStatus" => Ok(Responsible::NoDistributorStatus),
        "NoClientStatus" => Ok(Responsible::NoClientStatus),
        "NonOperational" => Ok(Responsible::NonOperational),
        "PhysicalReview" => Ok(Responsible::PhysicalReview),
        other => Err(DbError::Conversion(format!("unknown responsible: {other}"))),
    }
}

#[derive(Debug, SurrealValue)]
struct RegisterRow {
    vehicle_id: String,
    distributor_id: String,
    report_date: String,
    last_connection: DateTime<Utc>,
    problem: String,
    disconnection_type: String,
    status: String,
    responsible: String,
    comment: String,
    platform_client: String,
    speed: Option<f64>,
    geofence_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RegisterRow {
    fn into_register(self, id: Uuid) -> Result<Register, DbError> {
        Ok(Register {
            id,
            vehicle_id: parse_uuid(&self.vehicle_id, "vehicle")?,
            distributor_id: parse_uuid(&self.distributor_id, "distributor")?,
            report_date: parse_date(&self.report_date)?,
            last_connection: self.last_connection,
            problem: self.problem,
            disconnection_type: parse_disconnection_type(&self.disconnection_type)?,
            status: parse_status(&self.status)?,
            responsible: parse_responsible(&self.responsible)?,
            comment: self.comment,
            platform_client: self.platform_client,
            speed: self.speed,
            geofence_name: self.geofence_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct RegisterRowWithId {
    record_id: String,
    vehicle_id: String,
    distributor_id: String,
    report_date: String,
    last_connection: DateTime<Utc>,
    problem: String,
    disconnection_type: String,
    status: String,
    responsible: String,
    comment: String,
    platform_client: String,
    speed: Option<f64>,
    geofence_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RegisterRowWithId {
    fn try_into_register(self) -> Result<Register, DbError> {
        let id = parse_uuid(&self.record_id, "register")?;
        RegisterRow {
            vehicle_id: self.vehicle_id,
            distributor_id: self.distributor_id,
            report_date: self.report_date,
            last_connection: self.last_connection,
            problem: self.problem,
            disconnection_type: self.disconnection_type,
            status: self.status,
            responsible: self.responsible,
            comment: self.comment,
            platform_client: self.platform_client,
            speed: self.speed,
            geofence_name: self.geofence_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_register(id)
    }
}

/// SurrealDB implementation of the Register repository.
#[derive(Clone)]
pub struct SurrealRegisterRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRegisterRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_one(
        &self,
        vehicle_id: Uuid,
        report_date: NaiveDate,
    ) -> Result<Option<Register>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM register \
                 WHERE vehicle_id = $vehicle_id AND report_date = $report_date \
                 LIMIT 1",
            )
            .bind(("vehicle_id", vehicle_id.to_string()))
            .bind(("report_date", format_date(report_date)))
            .await?;

        let rows: Vec<RegisterRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(RegisterRowWithId::try_into_register)
            .transpose()
    }

    async fn load(&self, id: Uuid) -> Result<Register, DbError> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('register', $id)")
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<RegisterRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "register".into(),
            id: id_str,
        })?;

        row.into_register(id)
    }
}

impl<C: Connection> RegisterRepository for SurrealRegisterRepository<C> {
    async fn create_if_absent(
        &self,
        input: CreateRegister,
        audit: CreateBitacoraEntry,
    ) -> FleetResult<GetOrCreate<Register>> {
        if let Some(existing) = self.find_one(input.vehicle_id, input.report_date).await? {
            return Ok(GetOrCreate::existing(existing));
        }

        let id = Uuid::new_v4();
        let vehicle_id = input.vehicle_id;
        let report_date = input.report_date;

        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('register', $id) SET \
                 vehicle_id = $vehicle_id, \
                 distributor_id = $distributor_id, \
                 report_date = $report_date, \
                 last_connection = $last_connection, \
                 problem = $problem, \
                 disconnection_type = $disconnection_type, \
                 status = $status, \
                 responsible = $responsible, \
                 comment = $comment, \
                 platform_client = $platform_client, \
                 speed = $speed, \
                 geofence_name = $geofence_name; \
                 CREATE type::record('bitacora', $audit_id) SET \
                 register_id = $id, \
                 user_id = $user_id, \
                 comment = $audit_comment; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .bind(("vehicle_id", vehicle_id.to_string()))
            .bind(("distributor_id", input.distributor_id.to_string()))
            .bind(("report_date", format_date(report_date)))
            .bind(("last_connection", input.last_connection))
            .bind(("problem", input.problem))
            .bind((
                "disconnection_type",
                input.disconnection_type.as_str().to_string(),
            ))
            .bind(("status", input.status.as_str().to_string()))
            .bind(("responsible", input.responsible.as_str().to_string()))
            .bind(("comment", input.comment))
            .bind(("platform_client", input.platform_client))
            .bind(("speed", input.speed))
            .bind(("geofence_name", input.geofence_name))
            .bind(("audit_id", Uuid::new_v4().to_string()))
            .bind(("user_id", audit.user_id.map(|u| u.to_string())))
            .bind(("audit_comment", audit.comment))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => Ok(GetOrCreate::created(self.load(id).await?)),
            Err(e) => {
                // Another writer took (vehicle, day) between our read and
                // the insert; the whole transaction was rolled back.
                debug!(%vehicle_id, %report_date, error = %e, "register insert conflicted");
                match self.find_one(vehicle_id, report_date).await? {
                    Some(existing) => Ok(GetOrCreate::existing(existing)),
                    None => Err(DbError::Query(e.to_string()).into()),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> FleetResult<Register> {
        Ok(self.load(id).await?)
    }

    async fn find_by_vehicle_and_date(
        &self,
        vehicle_id: Uuid,
        report_date: NaiveDate,
    ) -> FleetResult<Option<Register>> {
        Ok(self.find_one(vehicle_id, report_date).await?)
    }

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> FleetResult<Vec<Register>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM register \
                 WHERE vehicle_id = $vehicle_id ORDER BY report_date DESC",
            )
            .bind(("vehicle_id", vehicle_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RegisterRowWithId> = result.take(0).map_err(DbError::from)?;
        let registers = rows
            .into_iter()
            .map(RegisterRowWithId::try_into_register)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(registers)
    }

    async fn list_by_report_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FleetResult<Vec<Register>> {
        // ISO dates compare correctly as strings.
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM register \
                 WHERE report_date >= $start AND report_date <= $end \
                 ORDER BY report_date ASC",
            )
            .bind(("start", format_date(start)))
            .bind(("end", format_date(end)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RegisterRowWithId> = result.take(0).map_err(DbError::from)?;
        let registers = rows
            .into_iter()
            .map(RegisterRowWithId::try_into_register)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(registers)
    }

    async fn apply_update(
        &self,
        expected: &Register,
        changes: UpdateRegister,
        audit: CreateBitacoraEntry,
    ) -> FleetResult<Register> {
        let id = expected.id;

        let mut sets = Vec::new();
        if changes.problem.is_some() {
            sets.push("problem = $problem");
        }
        if changes.disconnection_type.is_some() {
            sets.push("disconnection_type = $disconnection_type");
        }
        if changes.status.is_some() {
            sets.push("status = $status");
        }
        if changes.responsible.is_some() {
            sets.push("responsible = $responsible");
        }
        if changes.comment.is_some() {
            sets.push("comment = $comment");
        }
        sets.push("updated_at = time::now()");

        // The UPDATE only matches while the editable fields still hold the
        // values the audit comment was computed from.
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $updated = (UPDATE type::record('register', $id) SET {} \
             WHERE problem = $was_problem \
             AND disconnection_type = $was_disconnection_type \
             AND status = $was_status \
             AND responsible = $was_responsible \
             AND comment = $was_comment); \
             IF !$updated {{ THROW 'register changed since it was read' }}; \
             CREATE type::record('bitacora', $audit_id) SET \
             register_id = $id, \
             user_id = $user_id, \
             comment = $audit_comment; \
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("was_problem", expected.problem.clone()))
            .bind((
                "was_disconnection_type",
                expected.disconnection_type.as_str().to_string(),
            ))
            .bind(("was_status", expected.status.as_str().to_string()))
            .bind(("was_responsible", expected.responsible.as_str().to_string()))
            .bind(("was_comment", expected.comment.clone()))
            .bind(("audit_id", Uuid::new_v4().to_string()))
            .bind(("user_id", audit.user_id.map(|u| u.to_string())))
            .bind(("audit_comment", audit.comment));

        if let Some(problem) = changes.problem {
            builder = builder.bind(("problem", problem));
        }
        if let Some(disconnection_type) = changes.disconnection_type {
            builder = builder.bind((
                "disconnection_type",
                disconnection_type.as_str().to_string(),
            ));
        }
        if let Some(status) = changes.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(responsible) = changes.responsible {
            builder = builder.bind(("responsible", responsible.as_str().to_string()));
        }
        if let Some(comment) = changes.comment {
            builder = builder.bind(("comment", comment));
        }

        let result = builder.await.map_err(DbError::from)?;
        if let Err(e) = result.check() {
            let message = e.to_string();
            // Rolled back. Tell a stale read or a lost commit race apart
            // from a genuine failure by looking at what is stored now.
            let current = self.load(id).await?;
            let lowered = message.to_lowercase();
            if !same_editable_fields(&current, expected)
                || lowered.contains("transaction")
                || lowered.contains("conflict")
            {
                debug!(register_id = %id, error = %message, "register update conflicted");
                return Err(FleetError::Conflict {
                    entity: "register".into(),
                    id: id.to_string(),
                });
            }
            return Err(DbError::Query(message).into());
        }

        Ok(self.load(id).await?)
    }
}

fn same_editable_fields(a: &Register, b: &Register) -> bool {
    a.problem == b.problem
        && a.disconnection_type == b.disconnection_type
        && a.status == b.status
        && a.responsible == b.responsible
        && a.comment == b.comment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_dates_sort_as_strings() {
        let a = format_date(NaiveDate::from_ymd_opt(2024, 9, 30).unwrap());
        let b = format_date(NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        assert!(a < b);
        assert_eq!(parse_date(&b).unwrap(), NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
    }

    #[test]
    fn every_status_parses_back() {
        for status in RegisterStatus::ALL {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_status("Stolen").is_err());
    }

    #[test]
    fn enum_strings_match_schema_asserts() {
        let schema = crate::schema::schema_v1();
        for status in RegisterStatus::ALL {
            assert!(schema.contains(&format!("'{}'", status.as_str())));
        }
        for responsible in [
            Responsible::NoDistributorStatus,
            Responsible::NoClientStatus,
            Responsible::NonOperational,
            Responsible::PhysicalReview,
        ] {
            assert_eq!(parse_responsible(responsible.as_str()).unwrap(), responsible);
            assert!(schema.contains(&format!("'{}'", responsible.as_str())));
        }
        assert_eq!(
            parse_disconnection_type("Route").unwrap(),
            DisconnectionType::Route
        );
    }
}
