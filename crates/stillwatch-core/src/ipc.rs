use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::{mpsc, oneshot},
};
use uuid::Uuid;

use stillwatch_storage::{AppSettings, LocationPoint, SettingsPatch};

use crate::tracker::{Command, Event, StatusSnapshot};

/// IPC request from CLI to daemon.
#[derive(Serialize, Deserialize, Debug)]
pub enum IpcRequest {
    Status,
    Shutdown,
    GetSettings,
    SetSettings(SettingsPatch),
    ListLocations,
    AddLocation { latitude: f64, longitude: f64 },
    EditLocation { id: Uuid, latitude: f64, longitude: f64 },
    DeleteLocation { id: Uuid },
}

/// IPC response from daemon to CLI.
#[derive(Serialize, Deserialize, Debug)]
pub enum IpcResponse {
    Status(StatusSnapshot),
    Settings(AppSettings),
    Locations(Vec<LocationPoint>),
    Location(LocationPoint),
    Changed(bool),
    Shutdown,
}

/// Client for communicating with the daemon over its Unix socket.
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    #[must_use]
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_path_buf(),
        }
    }

    /// Send one request and wait for the daemon's response.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or the exchange fails.
    pub async fn send_command(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .context("Failed to connect to daemon socket")?;

        let request_bytes = bincode::serialize(&request)?;
        stream.write_all(&request_bytes).await?;
        stream.shutdown().await?;

        let mut response_bytes = Vec::new();
        stream.read_to_end(&mut response_bytes).await?;
        if response_bytes.is_empty() {
            anyhow::bail!("Daemon closed the connection without responding");
        }
        let response = bincode::deserialize(&response_bytes)?;
        Ok(response)
    }
}

/// Forward one command into the tracker loop and wait for its reply.
async fn ask<T>(
    events: &mpsc::Sender<Event>,
    make: impl FnOnce(oneshot::Sender<T>) -> Command,
) -> Result<T> {
    let (respond, reply) = oneshot::channel();
    events
        .send(Event::Command(make(respond)))
        .await
        .map_err(|_| anyhow!("Tracker is not accepting commands"))?;
    reply.await.context("Tracker dropped the command")
}

async fn dispatch(events: &mpsc::Sender<Event>, request: IpcRequest) -> Result<IpcResponse> {
    match request {
        IpcRequest::Status => {
            let snapshot = ask(events, |respond| Command::Status { respond }).await?;
            Ok(IpcResponse::Status(snapshot))
        }
        IpcRequest::Shutdown => {
            ask(events, |respond| Command::Shutdown { respond }).await?;
            Ok(IpcResponse::Shutdown)
        }
        IpcRequest::GetSettings => {
            let settings = ask(events, |respond| Command::GetSettings { respond }).await?;
            Ok(IpcResponse::Settings(settings))
        }
        IpcRequest::SetSettings(patch) => {
            let settings = ask(events, |respond| Command::SetSettings { patch, respond }).await?;
            Ok(IpcResponse::Settings(settings))
        }
        IpcRequest::ListLocations => {
            let points = ask(events, |respond| Command::ListLocations { respond }).await?;
            Ok(IpcResponse::Locations(points))
        }
        IpcRequest::AddLocation {
            latitude,
            longitude,
        } => {
            let point = ask(events, |respond| Command::AddLocation {
                latitude,
                longitude,
                respond,
            })
            .await?;
            Ok(IpcResponse::Location(point))
        }
        IpcRequest::EditLocation {
            id,
            latitude,
            longitude,
        } => {
            let changed = ask(events, |respond| Command::EditLocation {
                id,
                latitude,
                longitude,
                respond,
            })
            .await?;
            Ok(IpcResponse::Changed(changed))
        }
        IpcRequest::DeleteLocation { id } => {
            let removed = ask(events, |respond| Command::DeleteLocation { id, respond }).await?;
            Ok(IpcResponse::Changed(removed))
        }
    }
}

async fn handle_connection(events: mpsc::Sender<Event>, mut stream: UnixStream) {
    let mut raw = Vec::new();
    if let Err(e) = stream.read_to_end(&mut raw).await {
        log::error!("Failed to read IPC request: {e}");
        return;
    }

    let request = match bincode::deserialize::<IpcRequest>(&raw) {
        Ok(request) => request,
        Err(e) => {
            log::error!("Failed to decode IPC request: {e}");
            return;
        }
    };
    log::debug!("IPC request: {request:?}");

    let response = match dispatch(&events, request).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Failed to serve IPC request: {e}");
            return;
        }
    };

    match bincode::serialize(&response) {
        Ok(bytes) => {
            if let Err(e) = stream.write_all(&bytes).await {
                log::error!("Failed to write IPC response: {e}");
            }
        }
        Err(e) => log::error!("Failed to encode IPC response: {e}"),
    }
}

/// Listen for CLI connections, forwarding each request into the tracker's
/// event loop.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound.
pub async fn listen(events: mpsc::Sender<Event>, socket_path: &Path) -> io::Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)?;
    log::info!("IPC server listening on {}", socket_path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(handle_connection(events.clone(), stream));
            }
            Err(e) => log::error!("Failed to accept IPC connection: {e}"),
        }
    }
}
