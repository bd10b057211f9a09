//! Disconnection business rules.
//!
//! Whether a snapshot is a disconnection and where it happened are two
//! separate decisions; both are pure.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use fleetwatch_core::models::register::{DisconnectionType, ProblemKind, RegisterStatus};

/// Fastest speed (km/h) a real reading can report.
pub const MAX_PLAUSIBLE_SPEED: f64 = 300.0;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Route when moving faster than `threshold` outside every geofence,
/// Base otherwise. Exactly at the threshold is Base.
pub fn classify(speed: f64, in_geofence: bool, threshold: f64) -> DisconnectionType {
    if speed > threshold && !in_geofence {
        DisconnectionType::Route
    } else {
        DisconnectionType::Base
    }
}

/// A snapshot is a disconnection when its last communication happened on
/// an earlier calendar day than `today`, both taken in `offset`. A missing
/// or unreadable timestamp counts as disconnected.
pub fn is_disconnected(
    last_communication: Option<&str>,
    today: NaiveDate,
    offset: FixedOffset,
) -> bool {
    match last_communication.and_then(|raw| parse_timestamp(raw, offset)) {
        Some(ts) => ts.with_timezone(&offset).date_naive() < today,
        None => true,
    }
}

/// Parse a provider timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD[T| ]HH:MM:SS[.fff][Z]` and `YYYY-MM-DD`.
/// Values without an offset are local to `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    let (naive, utc) = match raw.strip_suffix(['Z', 'z']) {
        Some(stripped) => (stripped, true),
        None => (raw, false),
    };

    let parsed = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(naive, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    if utc {
        Some(parsed.and_utc())
    } else {
        offset
            .from_local_datetime(&parsed)
            .single()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Calendar date of `now` in the deployment zone.
pub fn report_date(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

/// The geofence a snapshot places the vehicle in, if any. Blank names and
/// the provider's "outside" label mean no geofence.
pub fn geofence_name<'a>(name: Option<&'a str>, outside_label: &str) -> Option<&'a str> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .filter(|n| n.to_lowercase() != outside_label.trim().to_lowercase())
}

pub fn in_geofence(name: Option<&str>, outside_label: &str) -> bool {
    geofence_name(name, outside_label).is_some()
}

pub fn is_plausible_speed(speed: f64) -> bool {
    (0.0..=MAX_PLAUSIBLE_SPEED).contains(&speed)
}

/// Advisory severity in `[1, 5]`.
pub fn priority(disconnection_type: DisconnectionType, problem: Option<ProblemKind>) -> u8 {
    let mut priority = 1;
    if disconnection_type == DisconnectionType::Route {
        priority += 2;
    }
    if problem == Some(ProblemKind::HardwareFailure) {
        priority += 1;
    }
    priority.min(5)
}

pub fn recommended_status(problem: ProblemKind) -> RegisterStatus {
    match problem {
        ProblemKind::HardwareFailure | ProblemKind::Malfunction => RegisterStatus::Workshop,
        ProblemKind::ConnectionLoss | ProblemKind::LowBattery => RegisterStatus::Base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdmx() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn classification_table() {
        let cases = [
            (10.0, false, DisconnectionType::Route),
            (10.0, true, DisconnectionType::Base),
            (5.0, false, DisconnectionType::Base),
            (0.0, false, DisconnectionType::Base),
            (5.01, false, DisconnectionType::Route),
        ];
        for (speed, inside, expected) in cases {
            assert_eq!(classify(speed, inside, 5.0), expected, "speed={speed} inside={inside}");
        }
    }

    #[test]
    fn yesterday_is_disconnected_today_is_not() {
        let today = day(2025, 1, 21);
        assert!(is_disconnected(Some("2025-01-20 23:59:59"), today, cdmx()));
        assert!(!is_disconnected(Some("2025-01-21 00:00:01"), today, cdmx()));
    }

    #[test]
    fn deployment_zone_decides_the_day() {
        // 03:00Z on the 21st is still the evening of the 20th six hours west.
        let today = day(2025, 1, 21);
        assert!(is_disconnected(Some("2025-01-21T03:00:00Z"), today, cdmx()));
        assert!(!is_disconnected(Some("2025-01-21T07:00:00Z"), today, cdmx()));
    }

    #[test]
    fn unparseable_timestamp_is_disconnected() {
        let today = day(2025, 1, 21);
        assert!(is_disconnected(None, today, cdmx()));
        assert!(is_disconnected(Some(""), today, cdmx()));
        assert!(is_disconnected(Some("yesterday-ish"), today, cdmx()));
    }

    #[test]
    fn timestamp_formats() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 1, 20, 10, 30, 0).unwrap();
        for raw in [
            "2025-01-20T10:30:00Z",
            "2025-01-20T10:30:00+00:00",
            "2025-01-20 10:30:00",
            "2025-01-20T10:30:00",
            "2025-01-20 10:30:00Z",
            "2025-01-20 10:30:00.000",
        ] {
            assert_eq!(parse_timestamp(raw, utc), Some(expected), "{raw}");
        }
        assert_eq!(
            parse_timestamp("2025-01-20", utc),
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn naive_timestamps_are_local() {
        let ts = parse_timestamp("2025-01-20 10:00:00", cdmx()).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 1, 20, 16, 0, 0).unwrap());
    }

    #[test]
    fn report_date_uses_deployment_zone() {
        let now = Utc.with_ymd_and_hms(2025, 1, 21, 2, 0, 0).unwrap();
        assert_eq!(report_date(now, cdmx()), day(2025, 1, 20));
    }

    #[test]
    fn outside_label_means_no_geofence() {
        assert!(!in_geofence(Some("Fuera"), "Fuera"));
        assert!(!in_geofence(Some(" fuera "), "Fuera"));
        assert!(!in_geofence(Some("   "), "Fuera"));
        assert!(!in_geofence(None, "Fuera"));
        assert_eq!(geofence_name(Some(" Base Centro "), "Fuera"), Some("Base Centro"));
    }

    #[test]
    fn priority_is_capped() {
        assert_eq!(priority(DisconnectionType::Base, None), 1);
        assert_eq!(priority(DisconnectionType::Route, None), 3);
        assert_eq!(
            priority(DisconnectionType::Route, Some(ProblemKind::HardwareFailure)),
            4
        );
        assert_eq!(
            priority(DisconnectionType::Base, Some(ProblemKind::LowBattery)),
            1
        );
    }

    #[test]
    fn status_recommendations() {
        assert_eq!(recommended_status(ProblemKind::HardwareFailure), RegisterStatus::Workshop);
        assert_eq!(recommended_status(ProblemKind::Malfunction), RegisterStatus::Workshop);
        assert_eq!(recommended_status(ProblemKind::ConnectionLoss), RegisterStatus::Base);
        assert_eq!(recommended_status(ProblemKind::LowBattery), RegisterStatus::Base);
    }

    #[test]
    fn speed_plausibility() {
        assert!(is_plausible_speed(0.0));
        assert!(is_plausible_speed(300.0));
        assert!(!is_plausible_speed(-1.0));
        assert!(!is_plausible_speed(450.0));
        assert!(!is_plausible_speed(f64::NAN));
    }
}
