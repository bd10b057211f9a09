//! Fleetwatch Core: domain models, repository traits and error types
//! shared by the store, the ETL pipeline and the CLI.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{FleetError, FleetResult};
