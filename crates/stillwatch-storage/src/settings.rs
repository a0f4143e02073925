use crate::kv::KvStore;
use crate::models::{AppSettings, SettingsPatch};

/// Store namespace holding the settings record.
pub const SETTINGS_NAMESPACE: &str = "settings";

const SETTINGS_KEY: &str = "appSettings";

/// Sole authority over the persisted settings record.
///
/// The in-memory value is authoritative for the lifetime of the process; the
/// KV store is a mirror written on every successful mutation. Write failures
/// are logged and the session continues on the in-memory state.
pub struct SettingsStore {
    kv: KvStore,
    current: AppSettings,
}

impl SettingsStore {
    /// Load the persisted settings, falling back to defaults when nothing is
    /// stored or the stored record does not parse.
    #[must_use]
    pub fn load(kv: KvStore) -> Self {
        let current = match kv.get_string(SETTINGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::error!("Stored settings are unreadable, using defaults: {e}");
                AppSettings::default()
            }),
            Ok(None) => AppSettings::default(),
            Err(e) => {
                log::error!("Failed to read stored settings, using defaults: {e}");
                AppSettings::default()
            }
        };
        Self { kv, current }
    }

    /// Current settings.
    #[must_use]
    pub fn get(&self) -> AppSettings {
        self.current
    }

    pub fn set_push_notifications_enabled(&mut self, enabled: bool) {
        self.current.is_push_notifications_enabled = enabled;
        self.persist();
    }

    pub fn set_location_tracking_enabled(&mut self, enabled: bool) {
        self.current.is_location_tracking_enabled = enabled;
        self.persist();
    }

    /// Set the sampling rate in seconds. Rates that are not finite and
    /// non-negative are coerced to 0, which disables sampling.
    pub fn set_location_sampling_rate(&mut self, rate: f64) {
        self.current.location_sampling_rate = safe_rate(rate);
        self.persist();
    }

    /// Merge a partial update into the current settings, persisting once.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(enabled) = patch.push_notifications_enabled {
            self.current.is_push_notifications_enabled = enabled;
        }
        if let Some(rate) = patch.location_sampling_rate {
            self.current.location_sampling_rate = safe_rate(rate);
        }
        if let Some(enabled) = patch.location_tracking_enabled {
            self.current.is_location_tracking_enabled = enabled;
        }
        self.persist();
    }

    fn persist(&self) {
        match serde_json::to_string(&self.current) {
            Ok(raw) => {
                if let Err(e) = self.kv.set(SETTINGS_KEY, &raw) {
                    log::error!("Failed to save settings: {e}");
                }
            }
            Err(e) => log::error!("Failed to serialize settings: {e}"),
        }
    }
}

fn safe_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate >= 0.0 {
        rate
    } else {
        0.0
    }
}
