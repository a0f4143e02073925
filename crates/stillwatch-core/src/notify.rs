use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{process::Command, sync::mpsc};

use crate::tracker::Event;

/// Notification channel metadata. Registration is idempotent: re-announcing
/// an existing channel is a no-op on every supported platform.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The one channel this application posts to.
pub const INACTIVITY_CHANNEL: Channel = Channel {
    id: "location-inactivity",
    name: "Location Inactivity Alerts",
    description: "Alerts when location tracking has been inactive for a while.",
};

/// A user-visible alert.
#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    /// The tracking-has-gone-quiet alert. Activating it disables tracking.
    #[must_use]
    pub fn inactivity() -> Self {
        Self {
            title: "Location Inactivity Alert".to_string(),
            message: "Your location has not changed for 10 minutes. Tap to disable tracking."
                .to_string(),
        }
    }

    /// Shown when a position fetch is refused by the platform.
    #[must_use]
    pub fn permission_denied() -> Self {
        Self {
            title: "Location permission denied. Please enable it in settings.".to_string(),
            message: String::new(),
        }
    }
}

/// Trait for delivering alerts to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert. With `watch_interaction` set, the user activating
    /// the alert is reported back as [`Event::AlertActivated`].
    ///
    /// # Errors
    ///
    /// Returns an error if delivery cannot be started. Whether the alert is
    /// ever seen or touched is inherently fire-and-forget.
    async fn deliver(&self, alert: &Alert, watch_interaction: bool) -> Result<()>;
}

/// Delivers alerts with `notify-send`, the freedesktop notification client.
pub struct NotifySendNotifier {
    channel: Channel,
    events: mpsc::Sender<Event>,
}

impl NotifySendNotifier {
    #[must_use]
    pub fn new(channel: Channel, events: mpsc::Sender<Event>) -> Self {
        log::info!(
            "Notification channel '{}' ({}) ready: {}",
            channel.id,
            channel.name,
            channel.description
        );
        Self { channel, events }
    }

    fn command(&self, alert: &Alert, with_action: bool) -> Command {
        let mut cmd = Command::new("notify-send");
        cmd.arg("--app-name=stillwatch")
            .arg(format!("--category={}", self.channel.id))
            .arg("--urgency=critical");
        if with_action {
            cmd.arg("--action=default=Disable tracking");
        }
        cmd.arg(&alert.title);
        if !alert.message.is_empty() {
            cmd.arg(&alert.message);
        }
        cmd
    }
}

#[async_trait]
impl Notifier for NotifySendNotifier {
    async fn deliver(&self, alert: &Alert, watch_interaction: bool) -> Result<()> {
        if !watch_interaction {
            self.command(alert, false)
                .spawn()
                .context("Failed to spawn notify-send")?;
            return Ok(());
        }

        // Interactive delivery blocks until the notification is activated or
        // dismissed, so it runs in its own task and reports activation back
        // through the event channel.
        let mut interactive = self.command(alert, true);
        let mut plain = self.command(alert, false);
        let events = self.events.clone();
        let title = alert.title.clone();
        tokio::spawn(async move {
            let output = match interactive.output().await {
                Ok(output) => output,
                Err(e) => {
                    log::error!("Failed to deliver alert '{title}': {e}");
                    return;
                }
            };
            if !output.status.success() {
                // Older notify-send builds reject --action; deliver without it.
                log::warn!("Interactive delivery was rejected, retrying plain");
                if let Err(e) = plain.spawn() {
                    log::error!("Failed to deliver alert '{title}': {e}");
                }
                return;
            }
            if String::from_utf8_lossy(&output.stdout).trim() == "default" {
                log::info!("Alert '{title}' activated by user");
                let _ = events.send(Event::AlertActivated).await;
            }
        });
        Ok(())
    }
}

/// Create the default notifier, reporting interactions into `events`.
#[must_use]
pub fn create_notifier(events: mpsc::Sender<Event>) -> Box<dyn Notifier> {
    Box::new(NotifySendNotifier::new(INACTIVITY_CHANNEL, events))
}
