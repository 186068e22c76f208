//! Cooldown applied to entities that keep failing.

use std::time::Duration;
use tokio::time::Instant;

/// Longest distance into the future a deadline may be placed.
pub const MAX_HORIZON: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// Linear cooldown: `failures * base`, never above `cap`.
///
/// Non-decreasing in `failures` for a fixed base and cap.
pub fn cooldown_for(consecutive_failures: u32, base: Duration, cap: Duration) -> Duration {
    base.saturating_mul(consecutive_failures).min(cap)
}

/// `now + after`, with `after` clamped to [`MAX_HORIZON`] so the addition
/// cannot overflow the clock.
pub fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after.min(MAX_HORIZON)).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn test_linear_until_cap() {
        assert_eq!(cooldown_for(3, 5 * MIN, 60 * MIN), 15 * MIN);
        assert_eq!(cooldown_for(4, 5 * MIN, 60 * MIN), 20 * MIN);
        assert_eq!(cooldown_for(12, 5 * MIN, 60 * MIN), 60 * MIN);
        assert_eq!(cooldown_for(500, 5 * MIN, 60 * MIN), 60 * MIN);
    }

    #[test]
    fn test_monotonic() {
        let mut last = Duration::ZERO;
        for failures in 0..40 {
            let next = cooldown_for(failures, 5 * MIN, 60 * MIN);
            assert!(next >= last);
            last = next;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_clamped() {
        let now = Instant::now();
        assert_eq!(deadline(now, 5 * MIN), now + 5 * MIN);
        assert_eq!(deadline(now, Duration::MAX), now + MAX_HORIZON);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        assert_eq!(cooldown_for(u32::MAX, Duration::MAX, MIN), MIN);
    }
}
