pub mod kv;
pub mod locations;
pub mod models;
pub mod settings;

pub use kv::KvStore;
pub use locations::{LocationStore, LOCATIONS_NAMESPACE};
pub use models::{AppSettings, LocationPoint, SettingsPatch};
pub use settings::{SettingsStore, SETTINGS_NAMESPACE};
