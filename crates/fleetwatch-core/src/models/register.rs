//! Register domain model: one disconnection event per vehicle per day.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a disconnection happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DisconnectionType {
    /// Moving above the speed threshold and outside any geofence.
    Route,
    /// Stationary, or inside a geofence.
    Base,
}

impl DisconnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectionType::Route => "Route",
            DisconnectionType::Base => "Base",
        }
    }

    /// Problem text written on newly created registers.
    pub fn problem_text(&self) -> &'static str {
        match self {
            DisconnectionType::Route => "Disconnection in route",
            DisconnectionType::Base => "Disconnection at base",
        }
    }
}

impl fmt::Display for DisconnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RegisterStatus {
    PossibleTamper,
    SignalLost,
    Workshop,
    PowerCut,
    Base,
    Crashed,
}

impl RegisterStatus {
    pub const ALL: [RegisterStatus; 6] = [
        RegisterStatus::PossibleTamper,
        RegisterStatus::SignalLost,
        RegisterStatus::Workshop,
        RegisterStatus::PowerCut,
        RegisterStatus::Base,
        RegisterStatus::Crashed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterStatus::PossibleTamper => "PossibleTamper",
            RegisterStatus::SignalLost => "SignalLost",
            RegisterStatus::Workshop => "Workshop",
            RegisterStatus::PowerCut => "PowerCut",
            RegisterStatus::Base => "Base",
            RegisterStatus::Crashed => "Crashed",
        }
    }
}

impl fmt::Display for RegisterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Party currently responsible for following up a register.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Responsible {
    NoDistributorStatus,
    NoClientStatus,
    NonOperational,
    PhysicalReview,
}

impl Responsible {
    pub fn as_str(&self) -> &'static str {
        match self {
            Responsible::NoDistributorStatus => "NoDistributorStatus",
            Responsible::NoClientStatus => "NoClientStatus",
            Responsible::NonOperational => "NonOperational",
            Responsible::PhysicalReview => "PhysicalReview",
        }
    }
}

impl fmt::Display for Responsible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of underlying problem, used only for advisory metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    HardwareFailure,
    ConnectionLoss,
    LowBattery,
    Malfunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub distributor_id: Uuid,
    /// Ingestion day in the deployment time zone.
    pub report_date: NaiveDate,
    pub last_connection: DateTime<Utc>,
    pub problem: String,
    pub disconnection_type: DisconnectionType,
    pub status: RegisterStatus,
    pub responsible: Responsible,
    pub comment: String,
    pub platform_client: String,
    pub speed: Option<f64>,
    pub geofence_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRegister {
    pub vehicle_id: Uuid,
    pub distributor_id: Uuid,
    pub report_date: NaiveDate,
    pub last_connection: DateTime<Utc>,
    pub problem: String,
    pub disconnection_type: DisconnectionType,
    pub status: RegisterStatus,
    pub responsible: Responsible,
    pub comment: String,
    pub platform_client: String,
    pub speed: Option<f64>,
    pub geofence_name: Option<String>,
}

/// User-editable register fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateRegister {
    pub problem: Option<String>,
    pub disconnection_type: Option<DisconnectionType>,
    pub status: Option<RegisterStatus>,
    pub responsible: Option<Responsible>,
    pub comment: Option<String>,
}

impl UpdateRegister {
    pub fn is_empty(&self) -> bool {
        self == &UpdateRegister::default()
    }
}
