use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded position sample.
///
/// Serialized field names match the historical on-disk JSON format, so
/// location history written by earlier builds keeps loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPoint {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch, stamped when the point was recorded.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl LocationPoint {
    /// Create a point stamped with the current wall-clock time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::with_timestamp(latitude, longitude, Utc::now().timestamp_millis())
    }

    /// Create a point with an explicit timestamp.
    #[must_use]
    pub fn with_timestamp(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            latitude,
            longitude,
            timestamp_ms,
        }
    }
}

/// User preferences controlling sampling and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub is_push_notifications_enabled: bool,
    /// Seconds between position fetch attempts. Zero disables sampling.
    pub location_sampling_rate: f64,
    pub is_location_tracking_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            is_push_notifications_enabled: true,
            location_sampling_rate: 8.0,
            is_location_tracking_enabled: true,
        }
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub push_notifications_enabled: Option<bool>,
    pub location_sampling_rate: Option<f64>,
    pub location_tracking_enabled: Option<bool>,
}
