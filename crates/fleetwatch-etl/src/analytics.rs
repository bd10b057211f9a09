//! Read-only reporting over persisted registers and vehicles.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use fleetwatch_core::error::{FleetError, FleetResult};
use fleetwatch_core::models::group::Group;
use fleetwatch_core::models::register::{DisconnectionType, Register};
use fleetwatch_core::models::vehicle::Vehicle;
use fleetwatch_core::repository::{
    ContractRepository, FleetStore, GroupRepository, RegisterRepository, VehicleRepository,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::rules;

/// Default look-back of the summary matrix, in days.
pub const DEFAULT_RANGE_DAYS: i64 = 7;

const NO_CONTRACT: &str = "N/A";

/// Connected/disconnected counts for one group or contract on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: u64,
    pub connected: u64,
    pub disconnected: u64,
    /// `connected / total * 100`, two decimals, 0 for an empty group.
    pub percentage_connected: f64,
}

/// Build one cell of the matrix.
pub fn daily_stats(date: NaiveDate, total: u64, disconnected: u64) -> DailyStats {
    let disconnected = disconnected.min(total);
    let connected = total - disconnected;
    let percentage_connected = if total == 0 {
        0.0
    } else {
        (connected as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    };

    DailyStats {
        date,
        total,
        connected,
        disconnected,
        percentage_connected,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractSummary {
    pub contract_id: Option<Uuid>,
    pub contract_name: String,
    pub daily: Vec<DailyStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub group_id: Uuid,
    pub external_id: i64,
    pub group_name: String,
    pub contracts: Vec<ContractSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryMatrix {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupStatistics {
    pub group_id: Uuid,
    pub external_id: i64,
    pub group_name: String,
    pub total_vehicles: u64,
    pub total_registers: u64,
    pub route_disconnections: u64,
    pub base_disconnections: u64,
    pub by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleDisconnections {
    pub vehicle_id: Uuid,
    pub external_id: i64,
    pub vin: String,
    pub group_name: String,
    pub disconnection_count: u64,
    pub last_connection: Option<DateTime<Utc>>,
}

pub struct AnalyticsService<S: FleetStore> {
    store: S,
    offset: FixedOffset,
}

impl<S: FleetStore> AnalyticsService<S> {
    pub fn new(store: S, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    fn today(&self) -> NaiveDate {
        rules::report_date(Utc::now(), self.offset)
    }

    /// Per group and contract, the daily matrix over `[start, end]`.
    /// Defaults: `end` = today, `start` = `end` - 7 days.
    pub async fn summary_matrix(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        group_external_id: Option<i64>,
    ) -> FleetResult<SummaryMatrix> {
        self.summary_matrix_at(start, end, group_external_id, self.today())
            .await
    }

    pub async fn summary_matrix_at(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        group_external_id: Option<i64>,
        today: NaiveDate,
    ) -> FleetResult<SummaryMatrix> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => days_before(end, DEFAULT_RANGE_DAYS)?,
        };
        if start > end {
            return Err(FleetError::Validation {
                message: format!("start date {start} is after end date {end}"),
            });
        }

        let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= end).collect();
        let groups = self.groups(group_external_id).await?;

        // Vehicles with at least one register, per report date.
        let mut disconnected: HashMap<NaiveDate, HashSet<Uuid>> = HashMap::new();
        for register in self
            .store
            .registers()
            .list_by_report_date_range(start, end)
            .await?
        {
            disconnected
                .entry(register.report_date)
                .or_default()
                .insert(register.vehicle_id);
        }

        let mut summaries = Vec::with_capacity(groups.len());
        for group in groups {
            let vehicles = self.store.vehicles().list_by_group(group.id).await?;

            let mut by_contract: BTreeMap<Option<Uuid>, Vec<&Vehicle>> = BTreeMap::new();
            for vehicle in &vehicles {
                by_contract.entry(vehicle.contract_id).or_default().push(vehicle);
            }
            if by_contract.is_empty() {
                // An empty group still reports a row of zeroes.
                by_contract.insert(None, Vec::new());
            }

            let mut contracts = Vec::with_capacity(by_contract.len());
            for (contract_id, members) in by_contract {
                let contract_name = match contract_id {
                    Some(id) => self.store.contracts().get_by_id(id).await?.label,
                    None => NO_CONTRACT.to_string(),
                };
                let daily = dates
                    .iter()
                    .map(|date| {
                        let down = disconnected.get(date).map_or(0, |ids| {
                            members.iter().filter(|v| ids.contains(&v.id)).count()
                        });
                        daily_stats(*date, members.len() as u64, down as u64)
                    })
                    .collect();
                contracts.push(ContractSummary {
                    contract_id,
                    contract_name,
                    daily,
                });
            }

            summaries.push(GroupSummary {
                group_id: group.id,
                external_id: group.external_id,
                group_name: group.description,
                contracts,
            });
        }

        info!(%start, %end, groups = summaries.len(), "Summary matrix built");
        Ok(SummaryMatrix {
            start_date: start,
            end_date: end,
            dates,
            groups: summaries,
        })
    }

    /// Totals for one group over the last `days` report days.
    pub async fn group_statistics(
        &self,
        group_external_id: i64,
        days: i64,
    ) -> FleetResult<GroupStatistics> {
        let group = self.store.groups().get_by_external_id(group_external_id).await?;
        let vehicles = self.store.vehicles().list_by_group(group.id).await?;
        let members: HashSet<Uuid> = vehicles.iter().map(|v| v.id).collect();
        let registers: Vec<Register> = self
            .registers_since(days)
            .await?
            .into_iter()
            .filter(|r| members.contains(&r.vehicle_id))
            .collect();

        let mut by_status = BTreeMap::new();
        for register in &registers {
            *by_status.entry(register.status.to_string()).or_insert(0) += 1;
        }
        let route = registers
            .iter()
            .filter(|r| r.disconnection_type == DisconnectionType::Route)
            .count() as u64;

        Ok(GroupStatistics {
            group_id: group.id,
            external_id: group.external_id,
            group_name: group.description,
            total_vehicles: vehicles.len() as u64,
            total_registers: registers.len() as u64,
            route_disconnections: route,
            base_disconnections: registers.len() as u64 - route,
            by_status,
        })
    }

    /// Vehicles with the most registers over the last `days` report days.
    pub async fn top_disconnected(
        &self,
        days: i64,
        limit: usize,
    ) -> FleetResult<Vec<VehicleDisconnections>> {
        let mut counts: HashMap<Uuid, u64> = HashMap::new();
        for register in self.registers_since(days).await? {
            *counts.entry(register.vehicle_id).or_insert(0) += 1;
        }

        let mut group_names: HashMap<Uuid, String> = HashMap::new();
        let mut top = Vec::with_capacity(counts.len());
        for (vehicle_id, count) in counts {
            let vehicle = self.store.vehicles().get_by_id(vehicle_id).await?;
            let group_name = match group_names.get(&vehicle.group_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.store.groups().get_by_id(vehicle.group_id).await?.description;
                    group_names.insert(vehicle.group_id, name.clone());
                    name
                }
            };
            top.push(VehicleDisconnections {
                vehicle_id,
                external_id: vehicle.external_id,
                vin: vehicle.vin,
                group_name,
                disconnection_count: count,
                last_connection: vehicle.last_connection,
            });
        }

        top.sort_by(|a, b| {
            b.disconnection_count
                .cmp(&a.disconnection_count)
                .then(a.external_id.cmp(&b.external_id))
        });
        top.truncate(limit);
        Ok(top)
    }

    async fn groups(&self, external_id: Option<i64>) -> FleetResult<Vec<Group>> {
        match external_id {
            Some(id) => Ok(vec![self.store.groups().get_by_external_id(id).await?]),
            None => self.store.groups().list().await,
        }
    }

    async fn registers_since(&self, days: i64) -> FleetResult<Vec<Register>> {
        let today = self.today();
        let start = days_before(today, days)?;
        self.store
            .registers()
            .list_by_report_date_range(start, today)
            .await
    }
}

/// `date` minus `days`, rejecting negative or out-of-calendar look-backs.
fn days_before(date: NaiveDate, days: i64) -> FleetResult<NaiveDate> {
    Some(days)
        .filter(|d| *d >= 0)
        .and_then(Duration::try_days)
        .and_then(|delta| date.checked_sub_signed(delta))
        .ok_or_else(|| FleetError::Validation {
            message: format!("look-back of {days} days is out of range"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap()
    }

    #[test]
    fn ten_vehicles_three_down() {
        let stats = daily_stats(day(), 10, 3);
        assert_eq!(stats.connected, 7);
        assert_eq!(stats.disconnected, 3);
        assert_eq!(stats.percentage_connected, 70.0);
    }

    #[test]
    fn empty_group_is_zero_percent() {
        let stats = daily_stats(day(), 0, 0);
        assert_eq!(stats.percentage_connected, 0.0);
        assert_eq!(stats.connected, 0);
    }

    #[test]
    fn look_back_is_checked() {
        assert_eq!(
            days_before(day(), 7).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 13).unwrap()
        );
        assert_eq!(days_before(day(), 0).unwrap(), day());
        for days in [-1, i64::MAX, 1_000_000_000] {
            assert!(matches!(
                days_before(day(), days),
                Err(FleetError::Validation { .. })
            ));
        }
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(daily_stats(day(), 3, 1).percentage_connected, 66.67);
        assert_eq!(daily_stats(day(), 7, 0).percentage_connected, 100.0);
    }
}
