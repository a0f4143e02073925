use stillwatch_storage::{AppSettings, LocationPoint};

/// Accumulated gap (milliseconds) that triggers the inactivity alert.
/// The threshold is strict: exactly ten minutes does not fire.
pub const INACTIVITY_THRESHOLD_MS: i64 = 10 * 60 * 1000;

/// Watches the recorded location sequence for prolonged inactivity.
///
/// "Inactivity" is a running sum of the wall-clock gap between the two most
/// recent samples, taken at every observation. It is not a measure of
/// movement: two samples far apart on the map still count toward the
/// threshold. Because any settings change while tracking is active also
/// re-adds the current last-pair gap, the counter is an approximation of
/// elapsed time, kept as-is for continuity with what users already expect.
#[derive(Debug, Default)]
pub struct InactivityMonitor {
    accumulated_ms: i64,
}

impl InactivityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current accumulated gap in milliseconds.
    #[must_use]
    pub fn accumulated_ms(&self) -> i64 {
        self.accumulated_ms
    }

    /// Re-evaluate after a committed settings or locations change.
    ///
    /// Returns `true` when the threshold was crossed; the counter resets and
    /// the caller is expected to raise exactly one alert.
    pub fn observe(&mut self, settings: &AppSettings, points: &[LocationPoint]) -> bool {
        if !(settings.is_location_tracking_enabled && settings.is_push_notifications_enabled) {
            self.accumulated_ms = 0;
            return false;
        }
        if points.len() < 2 {
            return false;
        }

        let latest = &points[points.len() - 1];
        let second_latest = &points[points.len() - 2];
        // Gaps can be zero or negative when history was edited out of order;
        // they are applied unclamped.
        self.accumulated_ms += latest.timestamp_ms - second_latest.timestamp_ms;
        log::debug!("Inactivity counter at {} ms", self.accumulated_ms);

        if self.accumulated_ms > INACTIVITY_THRESHOLD_MS {
            self.accumulated_ms = 0;
            return true;
        }
        false
    }

    /// Forget any partial accumulation.
    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp_ms: i64) -> LocationPoint {
        LocationPoint::with_timestamp(35.6586, 139.7454, timestamp_ms)
    }

    #[test]
    fn test_accumulates_gap_between_two_most_recent_points() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        let mut points = vec![point(0)];
        assert!(!monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), 0);

        points.push(point(8_000));
        assert!(!monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), 8_000);

        points.push(point(16_000));
        assert!(!monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), 16_000);
    }

    #[test]
    fn test_threshold_is_strictly_greater_than() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        let mut points = vec![point(0), point(INACTIVITY_THRESHOLD_MS)];
        assert!(!monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), INACTIVITY_THRESHOLD_MS);

        points.push(point(INACTIVITY_THRESHOLD_MS + 1));
        assert!(monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), 0);
    }

    #[test]
    fn test_counter_restarts_after_an_alert() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        let mut points = vec![point(0), point(700_000)];
        assert!(monitor.observe(&settings, &points));

        points.push(point(708_000));
        assert!(!monitor.observe(&settings, &points));
        assert_eq!(monitor.accumulated_ms(), 8_000);
    }

    #[test]
    fn test_fires_once_after_enough_eight_second_gaps() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        let mut points = vec![point(0)];
        monitor.observe(&settings, &points);

        let mut alerts = 0;
        for i in 1..=76 {
            points.push(point(i * 8_000));
            if monitor.observe(&settings, &points) {
                alerts += 1;
                // 75 gaps land exactly on the threshold; the 76th crosses it.
                assert_eq!(i, 76);
            }
        }
        assert_eq!(alerts, 1);
    }

    #[test]
    fn test_disabling_either_toggle_resets_the_counter() {
        let settings = AppSettings::default();
        let points = vec![point(0), point(9_000)];

        let mut monitor = InactivityMonitor::new();
        monitor.observe(&settings, &points);
        assert_eq!(monitor.accumulated_ms(), 9_000);

        let tracking_off = AppSettings {
            is_location_tracking_enabled: false,
            ..settings
        };
        assert!(!monitor.observe(&tracking_off, &points));
        assert_eq!(monitor.accumulated_ms(), 0);

        monitor.observe(&settings, &points);
        let push_off = AppSettings {
            is_push_notifications_enabled: false,
            ..settings
        };
        assert!(!monitor.observe(&push_off, &points));
        assert_eq!(monitor.accumulated_ms(), 0);
    }

    #[test]
    fn test_fewer_than_two_points_changes_nothing() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        monitor.observe(&settings, &[point(0), point(5_000)]);
        assert_eq!(monitor.accumulated_ms(), 5_000);

        // History shrank (deletes), but the partial accumulation is kept.
        assert!(!monitor.observe(&settings, &[point(0)]));
        assert_eq!(monitor.accumulated_ms(), 5_000);

        assert!(!monitor.observe(&settings, &[]));
        assert_eq!(monitor.accumulated_ms(), 5_000);
    }

    #[test]
    fn test_negative_and_zero_gaps_are_applied_unclamped() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();

        assert!(!monitor.observe(&settings, &[point(10_000), point(4_000)]));
        assert_eq!(monitor.accumulated_ms(), -6_000);

        assert!(!monitor.observe(&settings, &[point(4_000), point(4_000)]));
        assert_eq!(monitor.accumulated_ms(), -6_000);
    }

    #[test]
    fn test_settings_change_readds_the_current_last_pair_gap() {
        let mut monitor = InactivityMonitor::new();
        let settings = AppSettings::default();
        let points = vec![point(0), point(8_000)];

        // The same pair observed twice counts twice.
        monitor.observe(&settings, &points);
        monitor.observe(&settings, &points);
        assert_eq!(monitor.accumulated_ms(), 16_000);
    }

    #[test]
    fn test_reset_clears_partial_accumulation() {
        let mut monitor = InactivityMonitor::new();
        monitor.observe(&AppSettings::default(), &[point(0), point(8_000)]);

        monitor.reset();
        assert_eq!(monitor.accumulated_ms(), 0);
    }
}
