mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{env, fs, io, path::Path, process::Command, time};
use sysinfo::{Pid, System};
use tokio::sync::mpsc;
use tokio::time::sleep;

use stillwatch_core::{
    config,
    ipc::{self, IpcClient, IpcRequest, IpcResponse},
    notify::create_notifier,
    provider::create_provider,
    Tracker, INACTIVITY_THRESHOLD_MS,
};
use stillwatch_storage::{
    KvStore, LocationStore, SettingsStore, LOCATIONS_NAMESPACE, SETTINGS_NAMESPACE,
};

#[derive(Parser)]
#[command(name = "stillwatch")]
#[command(about = "Location tracking daemon with inactivity alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the tracking daemon
    Start,
    /// (Internal) Run the daemon process
    #[command(hide = true)]
    DaemonInternalStart,
    /// Stop the tracking daemon
    Stop,
    /// Check daemon status
    Status,
    /// Recorded location history
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },
    /// User preferences
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug)]
enum LocationsAction {
    /// List recorded locations
    List,
    /// Record a location manually
    Add { latitude: f64, longitude: f64 },
    /// Change the coordinates of a recorded location
    Edit {
        /// Location id (from `locations list`)
        id: String,
        #[arg(long)]
        latitude: f64,
        #[arg(long)]
        longitude: f64,
    },
    /// Remove a recorded location
    Delete {
        /// Location id (from `locations list`)
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Open a recorded location in the platform map viewer
    Open {
        /// Location id (from `locations list`)
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Update one setting
    Set {
        /// One of: push-notifications, tracking, sampling-rate
        key: String,
        /// New value (booleans: true/false, rate: seconds)
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::DaemonInternalStart) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    let data_dir = config::get_data_dir()?;

    match cli.command {
        Commands::Start => start_daemon(&data_dir),
        Commands::DaemonInternalStart => run_daemon_process().await,
        Commands::Stop => stop_daemon(&data_dir).await,
        Commands::Status => show_status(&data_dir).await,
        Commands::Locations { action } => match action {
            LocationsAction::List => commands::locations::list(&data_dir).await,
            LocationsAction::Add {
                latitude,
                longitude,
            } => commands::locations::add(&data_dir, latitude, longitude).await,
            LocationsAction::Edit {
                id,
                latitude,
                longitude,
            } => commands::locations::edit(&data_dir, &id, latitude, longitude).await,
            LocationsAction::Delete { id, yes } => {
                commands::locations::delete(&data_dir, &id, yes).await
            }
            LocationsAction::Open { id } => commands::locations::open(&data_dir, &id).await,
        },
        Commands::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => commands::settings::show(&data_dir).await,
            SettingsAction::Set { key, value } => {
                commands::settings::set(&data_dir, &key, &value).await
            }
        },
    }
}

fn start_daemon(data_dir: &Path) -> Result<()> {
    fs::create_dir_all(data_dir)?;
    let pid_file_path = config::pid_path(data_dir);
    let sock_path = config::sock_path(data_dir);

    // 1. Check if daemon is already running
    if pid_file_path.exists() {
        if let Ok(pid_str) = fs::read_to_string(&pid_file_path) {
            if let Ok(pid) = pid_str.trim().parse::<usize>() {
                let mut sys = System::new();
                if sys.refresh_process(Pid::from(pid)) {
                    log::info!("Daemon is already running (PID: {pid}).");
                    return Ok(());
                }
            }
        }
        // If pid file is stale, remove it
        log::warn!("Removing stale PID file.");
        let _ = fs::remove_file(&pid_file_path);
    }

    // 2. Clean up old socket if it exists
    if sock_path.exists() {
        log::warn!("Removing stale socket file.");
        fs::remove_file(&sock_path)?;
    }

    log::info!("Starting stillwatch daemon...");

    // 3. Spawn a new process for the daemon
    let current_exe = env::current_exe()?;
    let child = Command::new(current_exe)
        .arg("daemon-internal-start")
        .spawn()?;

    // 4. In parent process, write PID and exit
    log::info!("Daemon process started with PID: {}", child.id());
    fs::write(&pid_file_path, child.id().to_string())?;

    Ok(())
}

async fn run_daemon_process() -> Result<()> {
    // This is the detached daemon process
    // We must set up logging here, as this is a new process.
    if let Err(e) = setup_daemon_logging() {
        // If logging fails, we have no way to report errors. Panicking is the only option.
        panic!("Failed to set up daemon logging: {e}");
    }
    log::info!("Daemon process started internally.");

    if let Err(e) = daemon_main_logic().await {
        log::error!("Daemon main logic exited with a fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

async fn daemon_main_logic() -> Result<()> {
    let data_dir = config::get_data_dir()?;
    let settings = SettingsStore::load(KvStore::open(&data_dir, SETTINGS_NAMESPACE)?);
    let locations = LocationStore::load(KvStore::open(&data_dir, LOCATIONS_NAMESPACE)?);

    let (events_tx, events_rx) = mpsc::channel(64);
    let provider = create_provider();
    let notifier = create_notifier(events_tx.clone());
    let mut tracker = Tracker::new(
        settings,
        locations,
        provider,
        notifier,
        events_tx.clone(),
        events_rx,
    );

    let sock_path = config::sock_path(&data_dir);
    tokio::spawn(async move {
        if let Err(e) = ipc::listen(events_tx, &sock_path).await {
            log::error!("IPC server failed: {e}");
        }
    });

    tracker.run_with_signals().await
}

async fn stop_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = config::pid_path(data_dir);
    let sock_path = config::sock_path(data_dir);

    if !pid_file_path.exists() {
        log::info!("Daemon is not running (no PID file).");
        // Also remove socket if it exists for consistency
        if sock_path.exists() {
            fs::remove_file(&sock_path)?;
        }
        return Ok(());
    }

    let pid_str = fs::read_to_string(&pid_file_path)?;
    let pid = pid_str
        .trim()
        .parse::<usize>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    log::info!("Stopping stillwatch daemon (PID: {pid})...");
    let client = IpcClient::new(&sock_path);

    match client.send_command(IpcRequest::Shutdown).await {
        Ok(IpcResponse::Shutdown) => {
            log::info!("Daemon shutdown signal sent. Waiting for process to exit...");
            sleep(time::Duration::from_secs(2)).await;

            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                log::warn!("Daemon did not stop gracefully. Force killing...");
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                }
            } else {
                log::info!("Daemon stopped successfully.");
            }
        }
        Ok(resp) => log::error!("Received unexpected response from daemon: {resp:?}"),
        Err(e) => {
            // The daemon can exit between writing its reply and our read,
            // so a failed exchange normally means it is already gone.
            log::info!("Shutdown exchange did not complete ({e}), checking the process.");
            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                log::warn!("Daemon is still running. Force killing...");
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                    log::info!("Process killed.");
                }
            } else {
                log::info!("Daemon stopped successfully.");
            }
        }
    }

    // Cleanup
    fs::remove_file(&pid_file_path)?;
    if sock_path.exists() {
        fs::remove_file(&sock_path)?;
    }

    Ok(())
}

async fn show_status(data_dir: &Path) -> Result<()> {
    let sock_path = config::sock_path(data_dir);

    if !sock_path.exists() {
        println!("Daemon Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(&sock_path);
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status(snapshot)) => {
            println!("Daemon Status: Running");
            println!("\nSettings:");
            println!(
                "  Tracking:           {}",
                on_off(snapshot.settings.is_location_tracking_enabled)
            );
            println!(
                "  Push notifications: {}",
                on_off(snapshot.settings.is_push_notifications_enabled)
            );
            println!(
                "  Sampling rate:      {} seconds",
                snapshot.settings.location_sampling_rate
            );
            println!(
                "  Sampling schedule:  {}",
                if snapshot.sampling_armed {
                    "armed"
                } else {
                    "stopped"
                }
            );

            println!("\nRecorded locations: {}", snapshot.point_count);
            if let Some(point) = snapshot.last_point {
                println!(
                    "Last fix: {:.6}, {:.6} at {}",
                    point.latitude,
                    point.longitude,
                    commands::format_timestamp(point.timestamp_ms)
                );
            }
            println!(
                "Inactivity counter: {} / {} seconds",
                snapshot.inactive_for_ms / 1000,
                INACTIVITY_THRESHOLD_MS / 1000
            );
        }
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("Daemon Status: Not running (or not responding)");
        }
    }
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn setup_daemon_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = config::log_path(&config::get_data_dir()?);

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .init();

    Ok(())
}
