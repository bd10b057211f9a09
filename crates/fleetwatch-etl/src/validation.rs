//! Record validation and the VIN inclusion filter.

use fleetwatch_core::models::snapshot::Snapshot;

pub const VIN_LENGTH: usize = 17;

/// Uppercase and drop everything that is not ASCII alphanumeric.
pub fn normalize_vin(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Keeps only snapshots whose normalized VIN contains a configured
/// substring, so the outcome does not depend on separators that
/// validation strips anyway.
#[derive(Debug, Clone)]
pub struct VinFilter {
    pattern: String,
}

impl VinFilter {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: normalize_vin(pattern),
        }
    }

    /// An empty pattern keeps everything, including snapshots without a
    /// VIN (validation rejects those later).
    pub fn matches(&self, vin: Option<&str>) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        vin.is_some_and(|v| normalize_vin(v).contains(&self.pattern))
    }
}

/// A snapshot that passed validation, with its required fields lifted out.
#[derive(Debug, Clone)]
pub struct ValidSnapshot {
    pub vehicle_id: i64,
    /// Normalized, 17 characters.
    pub vin: String,
    pub snapshot: Snapshot,
}

/// Check required fields, VIN shape and coordinate ranges. Every problem
/// is reported, not only the first.
pub fn validate(snapshot: Snapshot) -> Result<ValidSnapshot, Vec<String>> {
    let mut errors = Vec::new();

    if snapshot.vehicle_id.is_none() {
        errors.push("missing vehicle_id".to_string());
    }

    let vin = match snapshot.vin.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("missing vin".to_string());
            None
        }
        Some(raw) => {
            let vin = normalize_vin(raw);
            if vin.len() != VIN_LENGTH {
                errors.push(format!(
                    "vin must have {VIN_LENGTH} alphanumeric characters, got {} ({raw:?})",
                    vin.len()
                ));
            }
            Some(vin)
        }
    };

    if let Some(lat) = snapshot.latitude.filter(|v| !(-90.0..=90.0).contains(v)) {
        errors.push(format!("latitude {lat} out of range [-90, 90]"));
    }
    if let Some(lon) = snapshot.longitude.filter(|v| !(-180.0..=180.0).contains(v)) {
        errors.push(format!("longitude {lon} out of range [-180, 180]"));
    }

    match (snapshot.vehicle_id, vin) {
        (Some(vehicle_id), Some(vin)) if errors.is_empty() => Ok(ValidSnapshot {
            vehicle_id,
            vin,
            snapshot,
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(vin: &str) -> Snapshot {
        Snapshot {
            vehicle_id: Some(1001),
            vin: Some(vin.into()),
            ..Default::default()
        }
    }

    #[test]
    fn vin_filter_matches_substring() {
        let filter = VinFilter::new("SZ");
        assert!(filter.matches(Some("1HGCM82633SZ12345")));
        assert!(filter.matches(Some("1hgcm82633sz12345")));
        assert!(!filter.matches(Some("1HGCM82633AA12345")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn vin_filter_ignores_separators() {
        let filter = VinFilter::new("SZ");
        assert!(filter.matches(Some("1HGCM82633S-Z12345")));
        assert!(filter.matches(Some("1hgcm82633 s.z 12345")));
        assert!(!filter.matches(Some("1HGCM82633S-A12345")));

        let vin = "1HGCM82633S-Z12345";
        let valid = validate(snapshot(vin)).unwrap();
        assert_eq!(filter.matches(Some(vin)), filter.matches(Some(&valid.vin)));
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = VinFilter::new("");
        assert!(filter.matches(Some("1HGCM82633AA12345")));
        assert!(filter.matches(None));
    }

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(normalize_vin("1hg-cm8 2633.sz12345"), "1HGCM82633SZ12345");
    }

    #[test]
    fn short_vin_is_rejected() {
        let errors = validate(snapshot("1HGCM82633SZ1234")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("17"));
    }

    #[test]
    fn latitude_out_of_range_is_rejected() {
        let mut snap = snapshot("1HGCM82633SZ12345");
        snap.latitude = Some(95.0);
        assert!(validate(snap).is_err());
    }

    #[test]
    fn valid_coordinates_pass() {
        let mut snap = snapshot("1HGCM82633SZ12345");
        snap.latitude = Some(45.0);
        snap.longitude = Some(-120.0);
        let valid = validate(snap).unwrap();
        assert_eq!(valid.vehicle_id, 1001);
        assert_eq!(valid.vin, "1HGCM82633SZ12345");
    }

    #[test]
    fn all_problems_are_reported() {
        let snap = Snapshot {
            latitude: Some(-91.0),
            longitude: Some(181.0),
            ..Default::default()
        };
        let errors = validate(snap).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
