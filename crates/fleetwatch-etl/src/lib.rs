//! Fleetwatch ETL: telemetry ingestion, disconnection rules, the
//! audited register service and read-only analytics.

pub mod analytics;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod validation;
pub mod writer;

pub use analytics::AnalyticsService;
pub use config::{EtlConfig, FetcherConfig, RegisterPolicy, RulesConfig};
pub use error::EtlError;
pub use fetcher::{TelemetryClient, TelemetrySource};
pub use pipeline::{EtlService, EtlStats};
pub use writer::RegisterService;
