use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub mod gpsd;

/// A geographic fix reported by the position source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// Options for a single position request.
#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    /// Prefer the most precise source available.
    pub high_accuracy: bool,
    /// Give up after this many milliseconds without a fix.
    pub timeout_ms: u64,
    /// Accept a cached fix no older than this.
    pub max_age_ms: u64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: 15_000,
            max_age_ms: 1_000,
        }
    }
}

/// Failure classes for a position request.
#[derive(Debug, Error)]
pub enum PositionError {
    /// The position source refused access.
    #[error("location permission denied")]
    PermissionDenied,
    /// The source is reachable but produced no usable fix.
    #[error("position unavailable: {0}")]
    Unavailable(String),
    /// No fix arrived within the configured timeout.
    #[error("position request timed out after {0} ms")]
    Timeout(u64),
}

/// Trait for reading the device position.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Check whether the position source is available to this process.
    ///
    /// # Errors
    ///
    /// Returns an error if the availability check itself fails.
    async fn request_permission(&self) -> Result<bool>;

    /// Fetch the current position, honoring the request options.
    async fn current_position(&self, options: &PositionOptions)
        -> Result<Position, PositionError>;
}

/// Create the default position provider.
///
/// Honors the `STILLWATCH_GPSD` environment variable for a non-standard
/// gpsd endpoint.
#[must_use]
pub fn create_provider() -> Arc<dyn PositionProvider> {
    let endpoint = std::env::var("STILLWATCH_GPSD")
        .unwrap_or_else(|_| gpsd::DEFAULT_ENDPOINT.to_string());
    Arc::new(gpsd::GpsdProvider::new(endpoint))
}
