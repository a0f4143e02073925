use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use stillwatch_storage::AppSettings;

use crate::provider::{PositionOptions, PositionProvider};
use crate::tracker::Event;

/// Outcome of a [`SamplingController::configure`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// A recurring schedule is running.
    Armed,
    /// Sampling is off (tracking disabled or rate zero).
    Stopped,
    /// Sampling was requested but the position source refused access.
    PermissionDenied,
}

/// Recurring position-sampling schedule keyed to the current settings.
///
/// Two states: stopped (no task) and armed (one timer task fetching on a
/// fixed interval). Re-arming always tears the previous schedule down first,
/// so at most one schedule is live at any time.
pub struct SamplingController {
    provider: Arc<dyn PositionProvider>,
    events: mpsc::Sender<Event>,
    schedule: Option<JoinHandle<()>>,
}

impl SamplingController {
    #[must_use]
    pub fn new(provider: Arc<dyn PositionProvider>, events: mpsc::Sender<Event>) -> Self {
        Self {
            provider,
            events,
            schedule: None,
        }
    }

    /// Whether a schedule is currently live.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.schedule
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Bring the schedule in line with `settings`: tear down any running
    /// schedule, then start a new one when tracking is enabled, the rate is
    /// positive and the position source grants access. The first fetch fires
    /// immediately on arming.
    pub async fn configure(&mut self, settings: &AppSettings) -> ScheduleState {
        self.disarm();

        let rate = settings.location_sampling_rate;
        if !settings.is_location_tracking_enabled || rate <= 0.0 {
            log::debug!("Location sampling not armed (rate {rate} seconds)");
            return ScheduleState::Stopped;
        }

        let granted = match self.provider.request_permission().await {
            Ok(granted) => granted,
            Err(e) => {
                log::error!("Position permission check failed: {e}");
                false
            }
        };
        if !granted {
            return ScheduleState::PermissionDenied;
        }

        let Ok(period) = Duration::try_from_secs_f64(rate) else {
            log::warn!("Sampling rate {rate} seconds is out of range, sampling disabled");
            return ScheduleState::Stopped;
        };
        if period.is_zero() {
            log::warn!("Sampling rate {rate} seconds rounds to zero, sampling disabled");
            return ScheduleState::Stopped;
        }

        log::info!("Location sampling armed: every {rate} seconds");
        let provider = Arc::clone(&self.provider);
        let events = self.events.clone();
        self.schedule = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let event = match provider.current_position(&PositionOptions::default()).await {
                    Ok(position) => Event::SampleTaken(position),
                    Err(e) => Event::SampleFailed(e),
                };
                if events.send(event).await.is_err() {
                    // Receiver is gone; the process is shutting down.
                    break;
                }
            }
        }));
        ScheduleState::Armed
    }

    /// Cancel any pending schedule. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.schedule.take() {
            handle.abort();
            log::info!("Location sampling stopped");
        }
    }
}

impl Drop for SamplingController {
    fn drop(&mut self) {
        if let Some(handle) = self.schedule.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Position, PositionError};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout};

    struct FakeProvider {
        granted: bool,
        fail_fetches: bool,
        permission_checks: AtomicUsize,
    }

    impl FakeProvider {
        fn granting() -> Self {
            Self {
                granted: true,
                fail_fetches: false,
                permission_checks: AtomicUsize::new(0),
            }
        }

        fn denying() -> Self {
            Self {
                granted: false,
                ..Self::granting()
            }
        }
    }

    #[async_trait]
    impl PositionProvider for FakeProvider {
        async fn request_permission(&self) -> Result<bool> {
            self.permission_checks.fetch_add(1, Ordering::SeqCst);
            Ok(self.granted)
        }

        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Position, PositionError> {
            if self.fail_fetches {
                return Err(PositionError::Unavailable("no fix".to_string()));
            }
            Ok(Position {
                latitude: 51.5007,
                longitude: -0.1246,
            })
        }
    }

    fn settings(tracking: bool, rate: f64) -> AppSettings {
        AppSettings {
            is_location_tracking_enabled: tracking,
            location_sampling_rate: rate,
            ..AppSettings::default()
        }
    }

    fn make_controller(
        provider: FakeProvider,
    ) -> (Arc<FakeProvider>, SamplingController, mpsc::Receiver<Event>) {
        let provider = Arc::new(provider);
        let (tx, rx) = mpsc::channel(64);
        let controller = SamplingController::new(provider.clone(), tx);
        (provider, controller, rx)
    }

    #[tokio::test]
    async fn test_zero_rate_stays_stopped_without_asking_permission() {
        let (provider, mut controller, _rx) = make_controller(FakeProvider::granting());

        let state = controller.configure(&settings(true, 0.0)).await;

        assert_eq!(state, ScheduleState::Stopped);
        assert!(!controller.is_armed());
        assert_eq!(provider.permission_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_tracking_stays_stopped() {
        let (provider, mut controller, _rx) = make_controller(FakeProvider::granting());

        let state = controller.configure(&settings(false, 8.0)).await;

        assert_eq!(state, ScheduleState::Stopped);
        assert!(!controller.is_armed());
        assert_eq!(provider.permission_checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denied_permission_reports_and_stays_stopped() {
        let (_provider, mut controller, mut rx) = make_controller(FakeProvider::denying());

        let state = controller.configure(&settings(true, 1.0)).await;

        assert_eq!(state, ScheduleState::PermissionDenied);
        assert!(!controller.is_armed());
        sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_arming_fetches_immediately() {
        let (_provider, mut controller, mut rx) = make_controller(FakeProvider::granting());

        // Long period: the only sample inside the test window is the
        // fire-on-entry one.
        let state = controller.configure(&settings(true, 30.0)).await;
        assert_eq!(state, ScheduleState::Armed);
        assert!(controller.is_armed());

        let event = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no immediate sample")
            .expect("channel closed");
        assert!(matches!(event, Event::SampleTaken(_)));
    }

    #[tokio::test]
    async fn test_fetch_failures_are_forwarded() {
        let provider = FakeProvider {
            fail_fetches: true,
            ..FakeProvider::granting()
        };
        let (_provider, mut controller, mut rx) = make_controller(provider);

        controller.configure(&settings(true, 30.0)).await;

        let event = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no failure event")
            .expect("channel closed");
        assert!(matches!(
            event,
            Event::SampleFailed(PositionError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_rearming_keeps_a_single_schedule() {
        let (_provider, mut controller, mut rx) = make_controller(FakeProvider::granting());
        let config = settings(true, 0.025);

        for _ in 0..3 {
            assert_eq!(controller.configure(&config).await, ScheduleState::Armed);
        }

        while rx.try_recv().is_ok() {}
        sleep(Duration::from_millis(150)).await;

        let mut samples = 0;
        while rx.try_recv().is_ok() {
            samples += 1;
        }
        // One 25 ms schedule yields about six samples in 150 ms; leaked
        // duplicates would roughly triple that.
        assert!((2..=10).contains(&samples), "saw {samples} samples");
    }

    #[tokio::test]
    async fn test_disarm_stops_sampling_and_is_idempotent() {
        let (_provider, mut controller, mut rx) = make_controller(FakeProvider::granting());

        controller.configure(&settings(true, 0.02)).await;
        timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("no sample before disarm")
            .expect("channel closed");

        controller.disarm();
        controller.disarm();
        assert!(!controller.is_armed());

        sleep(Duration::from_millis(20)).await;
        while rx.try_recv().is_ok() {}
        sleep(Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
    }
}
