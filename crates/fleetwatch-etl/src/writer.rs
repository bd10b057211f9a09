//! Register service: the idempotent pipeline write path and the audited
//! user-facing mutations.

use chrono::{DateTime, NaiveDate, Utc};
use fleetwatch_core::error::{FleetError, FleetResult};
use fleetwatch_core::models::GetOrCreate;
use fleetwatch_core::models::bitacora::{BitacoraEntry, CreateBitacoraEntry};
use fleetwatch_core::models::register::{
    CreateRegister, DisconnectionType, Register, RegisterStatus, Responsible, UpdateRegister,
};
use fleetwatch_core::repository::{BitacoraRepository, FleetStore, RegisterRepository};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{RegisterPolicy, RulesConfig};

/// Attempts for one user-facing update before a concurrent-modification
/// conflict is returned to the caller.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// A detected disconnection, ready to be written.
#[derive(Debug, Clone)]
pub struct NewDisconnection {
    pub vehicle_id: Uuid,
    pub distributor_id: Uuid,
    pub report_date: NaiveDate,
    pub disconnection_type: DisconnectionType,
    pub last_connection: DateTime<Utc>,
    pub platform_client: String,
    pub speed: Option<f64>,
    pub geofence_name: Option<String>,
}

/// Register writes and reads.
///
/// Generic over the store so that this crate has no dependency on the
/// database crate.
pub struct RegisterService<S: FleetStore> {
    store: S,
    rules: RulesConfig,
    policy: RegisterPolicy,
}

impl<S: FleetStore> RegisterService<S> {
    pub fn new(store: S, rules: RulesConfig, policy: RegisterPolicy) -> Self {
        Self {
            store,
            rules,
            policy,
        }
    }

    /// Create the register for `(vehicle, report_date)` unless one exists.
    /// The register and its creation audit entry are written together.
    pub async fn write_if_absent(
        &self,
        input: NewDisconnection,
    ) -> FleetResult<GetOrCreate<Register>> {
        let problem = input.disconnection_type.problem_text().to_string();
        let audit = CreateBitacoraEntry {
            register_id: Uuid::nil(),
            user_id: None,
            comment: format!("Register created: {problem}"),
        };

        let result = self
            .store
            .registers()
            .create_if_absent(
                CreateRegister {
                    vehicle_id: input.vehicle_id,
                    distributor_id: input.distributor_id,
                    report_date: input.report_date,
                    last_connection: input.last_connection,
                    problem,
                    disconnection_type: input.disconnection_type,
                    status: self.rules.initial_status(input.disconnection_type),
                    responsible: self.rules.default_responsible,
                    comment: String::new(),
                    platform_client: input.platform_client,
                    speed: input.speed,
                    geofence_name: input.geofence_name,
                },
                audit,
            )
            .await?;

        if result.created {
            debug!(
                register_id = %result.item.id,
                vehicle_id = %input.vehicle_id,
                disconnection_type = %input.disconnection_type,
                "Register created"
            );
        }
        Ok(result)
    }

    /// Whether end users may still change `register` at `now`.
    pub fn is_editable(&self, register: &Register, now: DateTime<Utc>) -> bool {
        now - register.created_at < self.policy.editable_window()
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: UpdateRegister,
        user_id: Option<Uuid>,
    ) -> FleetResult<Register> {
        self.update_at(id, changes, user_id, Utc::now()).await
    }

    /// Apply `changes` as of `now`. Fields equal to their current value
    /// are dropped; when nothing is left the register is returned as is
    /// and no audit entry is written.
    ///
    /// The audit comment describes the transition from the state that was
    /// read. If another writer changes the register first, the state is
    /// read again and the diff recomputed, up to [`MAX_UPDATE_ATTEMPTS`]
    /// times.
    pub async fn update_at(
        &self,
        id: Uuid,
        changes: UpdateRegister,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> FleetResult<Register> {
        let mut attempt = 1;
        loop {
            let current = self.store.registers().get_by_id(id).await?;
            if !self.is_editable(&current, now) {
                return Err(FleetError::NotEditable { id: id.to_string() });
            }

            let (delta, descriptions) = diff(&current, changes.clone());
            if delta.is_empty() {
                debug!(register_id = %id, "Update changes nothing");
                return Ok(current);
            }

            let audit = CreateBitacoraEntry {
                register_id: id,
                user_id,
                comment: format!("Register updated: {}", descriptions.join(", ")),
            };
            match self
                .store
                .registers()
                .apply_update(&current, delta, audit)
                .await
            {
                Ok(updated) => {
                    info!(register_id = %id, user_id = ?user_id, "Register updated");
                    return Ok(updated);
                }
                Err(FleetError::Conflict { .. }) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(register_id = %id, attempt, "Register changed concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn assign(
        &self,
        id: Uuid,
        responsible: Responsible,
        user_id: Option<Uuid>,
    ) -> FleetResult<Register> {
        let changes = UpdateRegister {
            responsible: Some(responsible),
            ..Default::default()
        };
        self.update(id, changes, user_id).await
    }

    pub async fn set_status(
        &self,
        id: Uuid,
        status: RegisterStatus,
        user_id: Option<Uuid>,
    ) -> FleetResult<Register> {
        let changes = UpdateRegister {
            status: Some(status),
            ..Default::default()
        };
        self.update(id, changes, user_id).await
    }

    pub async fn comment(
        &self,
        id: Uuid,
        comment: String,
        user_id: Option<Uuid>,
    ) -> FleetResult<Register> {
        let changes = UpdateRegister {
            comment: Some(comment),
            ..Default::default()
        };
        self.update(id, changes, user_id).await
    }

    pub async fn get(&self, id: Uuid) -> FleetResult<Register> {
        self.store.registers().get_by_id(id).await
    }

    /// Audit entries for a register, newest first.
    pub async fn history(&self, id: Uuid) -> FleetResult<Vec<BitacoraEntry>> {
        // Distinguish "no such register" from "no entries".
        self.store.registers().get_by_id(id).await?;
        self.store.bitacora().list_by_register(id).await
    }
}

/// Keep only the fields of `changes` that differ from `current`, and
/// describe each as `field: old → new`.
fn diff(current: &Register, changes: UpdateRegister) -> (UpdateRegister, Vec<String>) {
    let mut delta = UpdateRegister::default();
    let mut descriptions = Vec::new();

    if let Some(problem) = changes.problem.filter(|p| *p != current.problem) {
        descriptions.push(format!("problem: {} → {}", current.problem, problem));
        delta.problem = Some(problem);
    }
    if let Some(kind) = changes
        .disconnection_type
        .filter(|t| *t != current.disconnection_type)
    {
        descriptions.push(format!(
            "disconnection_type: {} → {}",
            current.disconnection_type, kind
        ));
        delta.disconnection_type = Some(kind);
    }
    if let Some(status) = changes.status.filter(|s| *s != current.status) {
        descriptions.push(format!("status: {} → {}", current.status, status));
        delta.status = Some(status);
    }
    if let Some(responsible) = changes.responsible.filter(|r| *r != current.responsible) {
        descriptions.push(format!(
            "responsible: {} → {}",
            current.responsible, responsible
        ));
        delta.responsible = Some(responsible);
    }
    if let Some(comment) = changes.comment.filter(|c| *c != current.comment) {
        descriptions.push(format!("comment: {} → {}", current.comment, comment));
        delta.comment = Some(comment);
    }

    (delta, descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn register() -> Register {
        let at = Utc.with_ymd_and_hms(2025, 1, 20, 10, 0, 0).unwrap();
        Register {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            distributor_id: Uuid::new_v4(),
            report_date: at.date_naive(),
            last_connection: at,
            problem: "Disconnection in route".into(),
            disconnection_type: DisconnectionType::Route,
            status: RegisterStatus::SignalLost,
            responsible: Responsible::NoDistributorStatus,
            comment: String::new(),
            platform_client: "ACME".into(),
            speed: Some(40.0),
            geofence_name: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn diff_drops_unchanged_fields() {
        let current = register();
        let (delta, descriptions) = diff(
            &current,
            UpdateRegister {
                status: Some(RegisterStatus::SignalLost),
                responsible: Some(Responsible::NoDistributorStatus),
                ..Default::default()
            },
        );
        assert!(delta.is_empty());
        assert!(descriptions.is_empty());
    }

    #[test]
    fn diff_lists_fields_in_fixed_order() {
        let current = register();
        let (delta, descriptions) = diff(
            &current,
            UpdateRegister {
                comment: Some("checked".into()),
                status: Some(RegisterStatus::Workshop),
                ..Default::default()
            },
        );
        assert_eq!(delta.status, Some(RegisterStatus::Workshop));
        assert_eq!(
            descriptions,
            vec!["status: SignalLost → Workshop", "comment:  → checked"]
        );
    }
}
