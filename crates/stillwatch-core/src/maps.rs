use std::process::Command;

const LABEL: &str = "Selected Location";

fn map_uri(latitude: f64, longitude: f64) -> String {
    if cfg!(target_os = "macos") {
        format!("maps:0,0?q={LABEL}@{latitude},{longitude}")
    } else {
        format!("geo:0,0?q={latitude},{longitude}({LABEL})")
    }
}

fn viewer() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Open the platform map viewer at the given coordinates. Best-effort:
/// launch failures are logged, never propagated.
pub fn open_map(latitude: f64, longitude: f64) {
    let uri = map_uri(latitude, longitude);
    match Command::new(viewer()).arg(&uri).spawn() {
        Ok(_) => log::info!("Opened map viewer at {latitude}, {longitude}"),
        Err(e) => log::error!("Failed to open map viewer: {e}"),
    }
}
