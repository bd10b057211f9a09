//! ETL error types.

use fleetwatch_core::error::FleetError;
use thiserror::Error;

use crate::pipeline::EtlStats;

/// Run-level failures. Per-record problems never surface here; they are
/// counted in [`EtlStats`].
#[derive(Debug, Error)]
pub enum EtlError {
    #[error("telemetry connection failed: {0}")]
    Connection(String),

    #[error("malformed telemetry response: {message}")]
    ResponseFormat { message: String, excerpt: String },

    #[error("run aborted: {source}")]
    Aborted {
        source: FleetError,
        /// Counters accumulated before the abort.
        stats: Box<EtlStats>,
    },

    #[error(transparent)]
    Fleet(#[from] FleetError),
}

impl EtlError {
    /// Statistics gathered before the run failed, if any records were
    /// processed.
    pub fn partial_stats(&self) -> Option<&EtlStats> {
        match self {
            EtlError::Aborted { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

impl From<EtlError> for FleetError {
    fn from(err: EtlError) -> Self {
        match err {
            EtlError::Connection(msg) => FleetError::Connection(msg),
            EtlError::ResponseFormat { message, .. } => FleetError::ResponseFormat(message),
            EtlError::Aborted { source, .. } => source,
            EtlError::Fleet(e) => e,
        }
    }
}
