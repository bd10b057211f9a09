//! Raw telemetry snapshot as delivered by the fleet-tracking provider.
//!
//! Every field is optional at this layer; required-field checks happen
//! in validation. Numeric fields accept JSON numbers or numeric strings
//! because the provider is inconsistent about quoting.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default, alias = "distribuidor_id", deserialize_with = "lenient_i64")]
    pub distributor_id: Option<i64>,
    #[serde(default, alias = "distribuidor", alias = "distribuidor_name")]
    pub distributor_name: Option<String>,
    #[serde(default)]
    pub geofence_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub speed: Option<f64>,
    #[serde(default)]
    pub last_communication_time: Option<String>,
}

impl Snapshot {
    /// Decode one element of a provider page.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("number out of range: {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid number: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                _ => Err(D::Error::custom(format!("expected integer, got {n}"))),
            }
        }
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid integer: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("expected integer, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_record() {
        let snap = Snapshot::from_json(json!({
            "vehicle_id": 1001,
            "vin": "1HGCM82633SZ12345",
            "client_id": 7,
            "client_name": "ACME",
            "group_id": 70,
            "group_name": "ACME NORTE",
            "distribuidor": "Distribuidora Sur",
            "distribuidor_id": 3,
            "geofence_name": "Base Centro",
            "latitude": 19.43,
            "longitude": -99.13,
            "speed": 12.5,
            "last_communication_time": "2025-01-20T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(snap.vehicle_id, Some(1001));
        assert_eq!(snap.distributor_id, Some(3));
        assert_eq!(snap.distributor_name.as_deref(), Some("Distribuidora Sur"));
        assert_eq!(snap.speed, Some(12.5));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let snap = Snapshot::from_json(json!({
            "vehicle_id": "1001",
            "latitude": "45.0",
            "longitude": " -120.5 ",
            "speed": ""
        }))
        .unwrap();

        assert_eq!(snap.vehicle_id, Some(1001));
        assert_eq!(snap.latitude, Some(45.0));
        assert_eq!(snap.longitude, Some(-120.5));
        assert_eq!(snap.speed, None);
    }

    #[test]
    fn garbage_coordinates_fail_to_decode() {
        let err = Snapshot::from_json(json!({ "vehicle_id": 1, "latitude": "north" }));
        assert!(err.is_err());
    }

    #[test]
    fn missing_fields_default_to_none() {
        let snap = Snapshot::from_json(json!({})).unwrap();
        assert_eq!(snap, Snapshot::default());
    }
}
