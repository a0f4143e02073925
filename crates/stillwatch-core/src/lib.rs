pub mod config;
pub mod inactivity;
pub mod ipc;
pub mod maps;
pub mod notify;
pub mod provider;
pub mod sampler;
pub mod tracker;

pub use inactivity::{InactivityMonitor, INACTIVITY_THRESHOLD_MS};
pub use tracker::Tracker;
