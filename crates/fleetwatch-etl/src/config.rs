//! Pipeline configuration.

use chrono::{Duration, FixedOffset, Offset, Utc};
use fleetwatch_core::models::register::{DisconnectionType, RegisterStatus, Responsible};

/// Telemetry provider connection settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Paged endpoint, queried with `page` and `page_size`.
    pub base_url: String,
    /// Sent as a Bearer token when set.
    pub api_key: Option<String>,
    /// Requested page size (default: 5000).
    pub page_size: u32,
    /// Upper bound the provider accepts for `page_size` (default: 5000).
    pub max_page_size: u32,
    /// Per-request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl FetcherConfig {
    /// Page size actually sent, clamped to `[1, max_page_size]`.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, self.max_page_size.max(1))
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            page_size: 5000,
            max_page_size: 5000,
            timeout_secs: 30,
        }
    }
}

/// Disconnection business rules.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    /// Speeds strictly above this count as moving (default: 5.0 km/h).
    pub speed_threshold: f64,
    /// Initial status of a register classified as Route.
    pub route_status: RegisterStatus,
    /// Initial status of a register classified as Base.
    pub base_status: RegisterStatus,
    pub default_responsible: Responsible,
    /// Geofence name the provider reports for "outside every geofence".
    pub outside_geofence_label: String,
    /// Deployment time zone as a fixed offset from UTC (default: -360).
    pub utc_offset_minutes: i32,
}

impl RulesConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn initial_status(&self, disconnection_type: DisconnectionType) -> RegisterStatus {
        match disconnection_type {
            DisconnectionType::Route => self.route_status,
            DisconnectionType::Base => self.base_status,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 5.0,
            route_status: RegisterStatus::SignalLost,
            base_status: RegisterStatus::PossibleTamper,
            default_responsible: Responsible::NoDistributorStatus,
            outside_geofence_label: "Fuera".into(),
            utc_offset_minutes: -360,
        }
    }
}

/// Constraints on user-driven register mutations.
#[derive(Debug, Clone)]
pub struct RegisterPolicy {
    /// Days after creation during which a register may be edited.
    pub editable_days: i64,
}

impl RegisterPolicy {
    pub fn editable_window(&self) -> Duration {
        Duration::days(self.editable_days)
    }
}

impl Default for RegisterPolicy {
    fn default() -> Self {
        Self { editable_days: 7 }
    }
}

/// Top-level configuration for one ETL deployment.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub fetcher: FetcherConfig,
    pub rules: RulesConfig,
    pub policy: RegisterPolicy,
    /// Substring a VIN must contain to be ingested. Empty keeps all.
    pub vin_filter_pattern: String,
    /// Records per batch (default: 2000).
    pub batch_size: usize,
    /// Records processed concurrently inside a batch (default: 8).
    pub concurrency: usize,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            rules: RulesConfig::default(),
            policy: RegisterPolicy::default(),
            vin_filter_pattern: "SZ".into(),
            batch_size: 2000,
            concurrency: 8,
        }
    }
}
