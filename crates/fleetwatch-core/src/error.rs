//! Error types shared by every fleetwatch crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Connection to telemetry provider failed: {0}")]
    Connection(String),

    #[error("Malformed telemetry response: {0}")]
    ResponseFormat(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity resolution failed: {0}")]
    Resolution(String),

    #[error("Register {id} is no longer editable")]
    NotEditable { id: String },

    /// The stored entity changed between read and write.
    #[error("Concurrent modification of {entity} {id}")]
    Conflict { entity: String, id: String },

    #[error("Database error: {0}")]
    Database(String),
}

pub type FleetResult<T> = Result<T, FleetError>;
