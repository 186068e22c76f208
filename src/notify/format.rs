//! Message text.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::health::DegradationAlert;
use crate::status::{Status, TransitionEvent};

fn describe(status: Status) -> &'static str {
    match status {
        Status::Online => "came online",
        Status::Offline => "went offline",
        Status::Unknown => "is in an unknown state",
    }
}

pub fn transition(event: &TransitionEvent) -> String {
    format!(
        "{} {} (was {}) at {}",
        event.name,
        describe(event.new_status),
        event.previous_status,
        timestamp(event.observed_at)
    )
}

pub fn degradation(alert: &DegradationAlert) -> String {
    format!(
        "Status checks are degraded: {} of {} checks failed ({:.0}%) in the last cycle. \
         Presence updates may be delayed.",
        alert.failed,
        alert.checked,
        alert.failure_rate * 100.0
    )
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Compact duration such as `4m 30s` or `2h 5m`.
pub fn duration(d: Duration) -> String {
    let secs = d.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (0, m, s) => format!("{}m {}s", m, s),
        (h, 0, _) => format!("{}h", h),
        (h, m, _) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_transition_text() {
        let event = TransitionEvent {
            name: "alice".into(),
            previous_status: Status::Online,
            new_status: Status::Offline,
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        };
        assert_eq!(
            transition(&event),
            "alice went offline (was online) at 2024-05-01 12:30:00 UTC"
        );
    }

    #[test]
    fn test_degradation_text() {
        let text = degradation(&DegradationAlert {
            failure_rate: 0.75,
            failed: 3,
            checked: 4,
        });
        assert!(text.contains("3 of 4"));
        assert!(text.contains("75%"));
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration(Duration::from_secs(45)), "45s");
        assert_eq!(duration(Duration::from_secs(300)), "5m");
        assert_eq!(duration(Duration::from_secs(270)), "4m 30s");
        assert_eq!(duration(Duration::from_secs(7_500)), "2h 5m");
        assert_eq!(duration(Duration::from_secs(3_600)), "1h");
    }
}
