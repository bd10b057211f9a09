//! Client domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fleet owner as known by the telemetry provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    /// Provider-side identifier. Unique and immutable.
    pub external_id: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClient {
    pub external_id: i64,
    pub description: String,
}

impl CreateClient {
    /// Build the input for a client seen in a snapshot, falling back to
    /// `"Cliente {id}"` when the provider sent no name.
    pub fn from_snapshot(external_id: i64, name: Option<&str>) -> Self {
        let description = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Cliente {external_id}"));
        Self {
            external_id,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_description_uses_external_id() {
        assert_eq!(CreateClient::from_snapshot(42, None).description, "Cliente 42");
        assert_eq!(
            CreateClient::from_snapshot(42, Some("  ")).description,
            "Cliente 42"
        );
        assert_eq!(
            CreateClient::from_snapshot(42, Some("BAJAS COPPEL")).description,
            "BAJAS COPPEL"
        );
    }
}
