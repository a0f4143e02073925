use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use stillwatch_storage::{
    AppSettings, LocationPoint, LocationStore, SettingsPatch, SettingsStore,
};

use crate::inactivity::InactivityMonitor;
use crate::notify::{Alert, Notifier};
use crate::provider::{Position, PositionError, PositionProvider};
use crate::sampler::{SamplingController, ScheduleState};

/// Everything that can wake the tracker loop.
#[derive(Debug)]
pub enum Event {
    /// A scheduled fetch produced a fix.
    SampleTaken(Position),
    /// A scheduled fetch failed.
    SampleFailed(PositionError),
    /// The user activated the inactivity alert.
    AlertActivated,
    /// A control request, answered through its embedded channel.
    Command(Command),
}

/// Control requests served by the tracker.
#[derive(Debug)]
pub enum Command {
    Status {
        respond: oneshot::Sender<StatusSnapshot>,
    },
    GetSettings {
        respond: oneshot::Sender<AppSettings>,
    },
    SetSettings {
        patch: SettingsPatch,
        respond: oneshot::Sender<AppSettings>,
    },
    ListLocations {
        respond: oneshot::Sender<Vec<LocationPoint>>,
    },
    AddLocation {
        latitude: f64,
        longitude: f64,
        respond: oneshot::Sender<LocationPoint>,
    },
    EditLocation {
        id: Uuid,
        latitude: f64,
        longitude: f64,
        respond: oneshot::Sender<bool>,
    },
    DeleteLocation {
        id: Uuid,
        respond: oneshot::Sender<bool>,
    },
    Shutdown {
        respond: oneshot::Sender<()>,
    },
}

/// Point-in-time view of the daemon, reported over IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub settings: AppSettings,
    pub sampling_armed: bool,
    pub point_count: usize,
    pub inactive_for_ms: i64,
    pub last_point: Option<LocationPoint>,
}

/// Single owner of the stores and the reactive tracking logic.
///
/// All state changes flow through one event loop: samples and alert
/// activations from background tasks, and control requests from the CLI.
/// After every committed change the loop re-runs the two dependents, the
/// sampling schedule and the inactivity counter, so their view can never
/// drift from the stores.
pub struct Tracker {
    settings: SettingsStore,
    locations: LocationStore,
    sampler: SamplingController,
    monitor: InactivityMonitor,
    notifier: Box<dyn Notifier>,
    events: mpsc::Receiver<Event>,
    shutting_down: bool,
}

impl Tracker {
    #[must_use]
    pub fn new(
        settings: SettingsStore,
        locations: LocationStore,
        provider: Arc<dyn PositionProvider>,
        notifier: Box<dyn Notifier>,
        events_tx: mpsc::Sender<Event>,
        events_rx: mpsc::Receiver<Event>,
    ) -> Self {
        Self {
            settings,
            locations,
            sampler: SamplingController::new(provider, events_tx),
            monitor: InactivityMonitor::new(),
            notifier,
            events: events_rx,
            shutting_down: false,
        }
    }

    /// Run until a shutdown request or Ctrl+C arrives.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the `Result` leaves room for fatal
    /// startup conditions.
    pub async fn run_with_signals(&mut self) -> Result<()> {
        // Bring the schedule and the counter in line with whatever state was
        // loaded from disk before the first event arrives.
        self.reconfigure_sampler().await;
        self.evaluate_inactivity().await;
        log::info!("Tracker running");

        while !self.shutting_down {
            tokio::select! {
                maybe_event = self.events.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl+C, shutting down gracefully...");
                    self.shutting_down = true;
                }
            }
        }

        self.sampler.disarm();
        log::info!("Tracker shut down gracefully.");
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::SampleTaken(position) => {
                let point = LocationPoint::new(position.latitude, position.longitude);
                log::info!(
                    "New location recorded: {:.6}, {:.6}",
                    point.latitude,
                    point.longitude
                );
                self.locations.insert(point);
                self.evaluate_inactivity().await;
            }
            Event::SampleFailed(error) => self.handle_sample_failure(error).await,
            Event::AlertActivated => {
                log::info!("Inactivity alert activated: disabling location tracking");
                let before = self.settings.get();
                self.settings.set_location_tracking_enabled(false);
                self.after_settings_change(before).await;
            }
            Event::Command(command) => self.handle_command(command).await,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Status { respond } => {
                let _ = respond.send(self.status());
            }
            Command::GetSettings { respond } => {
                let _ = respond.send(self.settings.get());
            }
            Command::SetSettings { patch, respond } => {
                let before = self.settings.get();
                self.settings.apply(patch);
                let _ = respond.send(self.settings.get());
                self.after_settings_change(before).await;
            }
            Command::ListLocations { respond } => {
                let _ = respond.send(self.locations.points().to_vec());
            }
            Command::AddLocation {
                latitude,
                longitude,
                respond,
            } => {
                let point = self.locations.add(latitude, longitude);
                log::info!("Location added manually: {latitude:.6}, {longitude:.6}");
                let _ = respond.send(point);
                self.evaluate_inactivity().await;
            }
            Command::EditLocation {
                id,
                latitude,
                longitude,
                respond,
            } => {
                let changed = self.locations.edit(id, latitude, longitude);
                let _ = respond.send(changed);
                if changed {
                    self.evaluate_inactivity().await;
                }
            }
            Command::DeleteLocation { id, respond } => {
                let removed = self.locations.delete(id);
                let _ = respond.send(removed);
                if removed {
                    self.evaluate_inactivity().await;
                }
            }
            Command::Shutdown { respond } => {
                log::info!("Shutdown requested");
                self.shutting_down = true;
                let _ = respond.send(());
            }
        }
    }

    async fn handle_sample_failure(&mut self, error: PositionError) {
        match error {
            PositionError::PermissionDenied => {
                log::error!("Position fetch refused: {error}");
                // No retry: the user has to re-grant access, so keep the
                // schedule down until the next settings change re-arms it.
                self.sampler.disarm();
                self.deliver(&Alert::permission_denied(), false).await;
            }
            PositionError::Unavailable(_) | PositionError::Timeout(_) => {
                log::warn!("Position fetch failed, next tick will retry: {error}");
            }
        }
    }

    /// Re-run the dependents of the settings record. The schedule only
    /// keys off the tracking flag and the rate, so changes to other fields
    /// leave it running; the inactivity counter re-reads every field.
    #[allow(clippy::float_cmp)]
    async fn after_settings_change(&mut self, before: AppSettings) {
        let now = self.settings.get();
        if now.is_location_tracking_enabled != before.is_location_tracking_enabled
            || now.location_sampling_rate != before.location_sampling_rate
        {
            self.reconfigure_sampler().await;
        }
        self.evaluate_inactivity().await;
    }

    async fn reconfigure_sampler(&mut self) {
        let settings = self.settings.get();
        if self.sampler.configure(&settings).await == ScheduleState::PermissionDenied {
            log::error!("Position source refused access, sampling not armed");
            self.deliver(&Alert::permission_denied(), false).await;
        }
    }

    async fn evaluate_inactivity(&mut self) {
        let settings = self.settings.get();
        if self.monitor.observe(&settings, self.locations.points()) {
            log::warn!("Location has been inactive past the threshold");
            self.deliver(&Alert::inactivity(), true).await;
        }
    }

    async fn deliver(&mut self, alert: &Alert, watch_interaction: bool) {
        if let Err(e) = self.notifier.deliver(alert, watch_interaction).await {
            log::error!("Failed to deliver alert '{}': {e}", alert.title);
        }
    }

    fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            settings: self.settings.get(),
            sampling_armed: self.sampler.is_armed(),
            point_count: self.locations.points().len(),
            inactive_for_ms: self.monitor.accumulated_ms(),
            last_point: self.locations.points().last().cloned(),
        }
    }
}
