use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;
use tabled::{Table, Tabled};
use uuid::Uuid;

use stillwatch_core::ipc::{IpcClient, IpcRequest, IpcResponse};
use stillwatch_core::maps;
use stillwatch_storage::LocationPoint;

use super::{daemon_socket, format_timestamp, open_locations};

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "Recorded")]
    recorded: String,
    #[tabled(rename = "Latitude")]
    latitude: f64,
    #[tabled(rename = "Longitude")]
    longitude: f64,
    #[tabled(rename = "ID")]
    id: String,
}

impl From<&LocationPoint> for LocationRow {
    fn from(point: &LocationPoint) -> Self {
        Self {
            recorded: format_timestamp(point.timestamp_ms),
            latitude: point.latitude,
            longitude: point.longitude,
            id: point.id.to_string(),
        }
    }
}

async fn fetch_all(data_dir: &Path) -> Result<Vec<LocationPoint>> {
    if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::ListLocations)
            .await?
        {
            IpcResponse::Locations(points) => Ok(points),
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        Ok(open_locations(data_dir)?.points().to_vec())
    }
}

pub async fn list(data_dir: &Path) -> Result<()> {
    let points = fetch_all(data_dir).await?;
    if points.is_empty() {
        println!("No locations recorded yet.");
        return Ok(());
    }

    let rows: Vec<LocationRow> = points.iter().map(LocationRow::from).collect();
    let table = Table::new(rows).to_string();
    println!("{table}");
    println!("\n{} location(s)", points.len());
    Ok(())
}

pub async fn add(data_dir: &Path, latitude: f64, longitude: f64) -> Result<()> {
    if !(latitude.is_finite() && longitude.is_finite()) {
        println!("Please enter valid numbers for latitude and longitude.");
        return Ok(());
    }

    let point = if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::AddLocation {
                latitude,
                longitude,
            })
            .await?
        {
            IpcResponse::Location(point) => point,
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        open_locations(data_dir)?.add(latitude, longitude)
    };

    println!(
        "Recorded location {} at {}",
        point.id,
        format_timestamp(point.timestamp_ms)
    );
    Ok(())
}

pub async fn edit(data_dir: &Path, id: &str, latitude: f64, longitude: f64) -> Result<()> {
    let Ok(parsed) = Uuid::parse_str(id) else {
        println!("No location found with id {id}");
        return Ok(());
    };
    if !(latitude.is_finite() && longitude.is_finite()) {
        println!("Please enter valid numbers for latitude and longitude.");
        return Ok(());
    }

    let changed = if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::EditLocation {
                id: parsed,
                latitude,
                longitude,
            })
            .await?
        {
            IpcResponse::Changed(changed) => changed,
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        open_locations(data_dir)?.edit(parsed, latitude, longitude)
    };

    if changed {
        println!("Location updated.");
    } else {
        println!("No location found with id {id}");
    }
    Ok(())
}

pub async fn delete(data_dir: &Path, id: &str, yes: bool) -> Result<()> {
    let Ok(parsed) = Uuid::parse_str(id) else {
        println!("No location found with id {id}");
        return Ok(());
    };
    let points = fetch_all(data_dir).await?;
    let Some(point) = points.iter().find(|p| p.id == parsed) else {
        println!("No location found with id {id}");
        return Ok(());
    };

    if !yes {
        print!(
            "Delete the location recorded at {}? [y/N] ",
            format_timestamp(point.timestamp_ms)
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !answer.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = if let Some(sock) = daemon_socket(data_dir) {
        match IpcClient::new(&sock)
            .send_command(IpcRequest::DeleteLocation { id: parsed })
            .await?
        {
            IpcResponse::Changed(removed) => removed,
            other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
        }
    } else {
        open_locations(data_dir)?.delete(parsed)
    };

    if removed {
        println!("Location deleted.");
    } else {
        println!("No location found with id {id}");
    }
    Ok(())
}

pub async fn open(data_dir: &Path, id: &str) -> Result<()> {
    let Ok(parsed) = Uuid::parse_str(id) else {
        println!("No location found with id {id}");
        return Ok(());
    };
    let points = fetch_all(data_dir).await?;
    let Some(point) = points.iter().find(|p| p.id == parsed) else {
        println!("No location found with id {id}");
        return Ok(());
    };

    maps::open_map(point.latitude, point.longitude);
    Ok(())
}
