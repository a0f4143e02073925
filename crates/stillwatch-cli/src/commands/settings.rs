use anyhow::Result;
use std::path::Path;

use stillwatch_core::ipc::{IpcClient, IpcRequest, IpcResponse};
use stillwatch_storage::{AppSettings, SettingsPatch};

use super::{daemon_socket, open_settings};

pub async fn show(data_dir: &Path) -> Result<()> {
    let settings = if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::GetSettings)
            .await?
        {
            IpcResponse::Settings(settings) => settings,
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        open_settings(data_dir)?.get()
    };

    print_settings(&settings);
    Ok(())
}

pub async fn set(data_dir: &Path, key: &str, value: &str) -> Result<()> {
    let Some(patch) = parse_patch(key, value) else {
        return Ok(());
    };

    let settings = if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::SetSettings(patch))
            .await?
        {
            IpcResponse::Settings(settings) => settings,
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        let mut store = open_settings(data_dir)?;
        store.apply(patch);
        store.get()
    };

    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &AppSettings) {
    println!(
        "Push notifications: {}",
        on_off(settings.is_push_notifications_enabled)
    );
    println!(
        "Location tracking:  {}",
        on_off(settings.is_location_tracking_enabled)
    );
    println!(
        "Sampling rate:      {} seconds",
        settings.location_sampling_rate
    );
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn parse_patch(key: &str, value: &str) -> Option<SettingsPatch> {
    let mut patch = SettingsPatch::default();
    match key {
        "push-notifications" => patch.push_notifications_enabled = Some(parse_bool(value)?),
        "tracking" => patch.location_tracking_enabled = Some(parse_bool(value)?),
        "sampling-rate" => patch.location_sampling_rate = Some(parse_rate(value)?),
        other => {
            println!(
                "Unknown setting '{other}'. Available: push-notifications, tracking, sampling-rate"
            );
            return None;
        }
    }
    Some(patch)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        other => {
            println!("Expected true or false, got '{other}'");
            None
        }
    }
}

fn parse_rate(value: &str) -> Option<f64> {
    // Clearing the rate has always meant 8000, not the 8-second default.
    if value.is_empty() {
        return Some(8_000.0);
    }
    match value.parse::<f64>() {
        Ok(rate) if rate >= 0.0 => Some(rate),
        _ => {
            println!("Expected a non-negative number of seconds, got '{value}'");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_accepts_non_negative_numbers() {
        assert!((parse_rate("8").unwrap() - 8.0).abs() < f64::EPSILON);
        assert!((parse_rate("0").unwrap() - 0.0).abs() < f64::EPSILON);
        assert!((parse_rate("2.5").unwrap() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_rate_rejects_garbage_and_negatives() {
        assert!(parse_rate("-1").is_none());
        assert!(parse_rate("fast").is_none());
        assert!(parse_rate("nan").is_none());
    }

    #[test]
    fn test_parse_rate_maps_empty_input_to_8000() {
        assert!((parse_rate("").unwrap() - 8_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_patch_targets_exactly_one_field() {
        let patch = parse_patch("tracking", "off").unwrap();
        assert_eq!(patch.location_tracking_enabled, Some(false));
        assert_eq!(patch.push_notifications_enabled, None);
        assert_eq!(patch.location_sampling_rate, None);

        assert!(parse_patch("volume", "11").is_none());
    }
}
