use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};

use super::{Position, PositionError, PositionOptions, PositionProvider};

/// Default gpsd endpoint on the local machine.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:2947";

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true}\n";

/// Position provider backed by a local gpsd instance.
///
/// gpsd speaks newline-delimited JSON: after a `?WATCH` command it streams
/// report objects, and the first `TPV` report with a 2D fix (mode >= 2)
/// carries usable coordinates.
pub struct GpsdProvider {
    endpoint: String,
}

impl GpsdProvider {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for GpsdProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

/// Subset of the gpsd TPV report this provider consumes.
#[derive(Debug, Deserialize)]
struct TpvReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
}

fn parse_fix(line: &str) -> Option<Position> {
    let report: TpvReport = serde_json::from_str(line).ok()?;
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }
    match (report.lat, report.lon) {
        (Some(latitude), Some(longitude)) => Some(Position {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

fn connect_error(e: &std::io::Error) -> PositionError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        PositionError::PermissionDenied
    } else {
        PositionError::Unavailable(format!("cannot reach gpsd: {e}"))
    }
}

#[async_trait]
impl PositionProvider for GpsdProvider {
    async fn request_permission(&self) -> Result<bool> {
        // Bounded like a fetch; a silent endpoint counts as a refusal.
        let wait = Duration::from_millis(PositionOptions::default().timeout_ms);
        match timeout(wait, TcpStream::connect(self.endpoint.as_str())).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                log::warn!("gpsd not reachable at {}: {e}", self.endpoint);
                Ok(false)
            }
            Err(_) => {
                log::warn!(
                    "gpsd at {} did not answer within {}ms",
                    self.endpoint,
                    wait.as_millis()
                );
                Ok(false)
            }
        }
    }

    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Position, PositionError> {
        match timeout(Duration::from_millis(options.timeout_ms), self.watch_for_fix()).await {
            Ok(result) => result,
            Err(_) => Err(PositionError::Timeout(options.timeout_ms)),
        }
    }
}

impl GpsdProvider {
    async fn watch_for_fix(&self) -> Result<Position, PositionError> {
        let stream = TcpStream::connect(self.endpoint.as_str())
            .await
            .map_err(|e| connect_error(&e))?;
        let (reader, mut writer) = stream.into_split();

        writer
            .write_all(WATCH_COMMAND)
            .await
            .map_err(|e| PositionError::Unavailable(format!("cannot start watch: {e}")))?;

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| PositionError::Unavailable(format!("gpsd stream failed: {e}")))?
        {
            if let Some(position) = parse_fix(&line) {
                return Ok(position);
            }
        }

        Err(PositionError::Unavailable(
            "gpsd closed the stream without a fix".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fix_accepts_tpv_with_2d_fix() {
        let line = r#"{"class":"TPV","device":"/dev/ttyACM0","mode":3,"time":"2024-01-10T09:30:00.000Z","lat":52.520008,"lon":13.404954,"alt":38.2}"#;
        let position = parse_fix(line).unwrap();
        assert!((position.latitude - 52.520008).abs() < f64::EPSILON);
        assert!((position.longitude - 13.404954).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_fix_rejects_reports_without_a_fix() {
        assert!(parse_fix(r#"{"class":"TPV","device":"/dev/ttyACM0","mode":1}"#).is_none());
        assert!(parse_fix(r#"{"class":"TPV","mode":2,"lat":52.5}"#).is_none());
    }

    #[test]
    fn test_parse_fix_ignores_other_report_classes() {
        assert!(parse_fix(r#"{"class":"VERSION","release":"3.25"}"#).is_none());
        assert!(parse_fix(r#"{"class":"SKY","satellites":[]}"#).is_none());
        assert!(parse_fix("not json").is_none());
    }

    #[tokio::test]
    async fn test_request_permission_accepts_a_listening_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let provider = GpsdProvider::new(endpoint);
        assert!(provider.request_permission().await.unwrap());
    }

    #[tokio::test]
    async fn test_request_permission_rejects_a_dead_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        let provider = GpsdProvider::new(endpoint);
        assert!(!provider.request_permission().await.unwrap());
    }
}
