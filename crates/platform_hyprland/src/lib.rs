//! hyprdock Platform Hyprland
//!
//! Hyprland compositor integration over its two local sockets.
//!
//! This crate handles:
//! - Locating the instance sockets from `HYPRLAND_INSTANCE_SIGNATURE`
//! - Request-scoped queries (`j/clients`, `j/monitors`, `j/activewindow`)
//! - Dispatch commands (focus, close, move to workspace)
//! - Decoding the event stream and keeping it connected
//! - Building filtered snapshots for the task engine

pub mod events;
pub mod snapshot;

use std::path::{Path, PathBuf};
use std::time::Duration;

use hyprdock_core::{ActiveWindow, Output, Window, WindowAddress, WorkspaceRef};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

pub use events::{run_event_pump, EventPumpConfig, HyprEvent};
pub use snapshot::SnapshotBuilder;

/// Largest reply accepted from the control socket.
pub const MAX_REPLY_SIZE: usize = 102_400;

/// Default bound on one request/reply round trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1500);

/// Environment variable naming the running compositor instance.
pub const INSTANCE_SIGNATURE_VAR: &str = "HYPRLAND_INSTANCE_SIGNATURE";

/// Errors that can occur while talking to the compositor.
#[derive(Debug, Error)]
pub enum HyprError {
    #[error("HYPRLAND_INSTANCE_SIGNATURE not set, is Hyprland running?")]
    MissingInstanceSignature,

    #[error("Compositor transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Compositor did not answer {command:?} within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("Malformed reply to {command:?}: {reason}")]
    Protocol { command: String, reason: String },

    #[error("Reply to {command:?} exceeds {limit} bytes")]
    ReplyTooLarge { command: String, limit: usize },

    #[error("Compositor rejected {command:?}: {reply}")]
    CommandRejected { command: String, reply: String },

    #[error("Event stream closed by the compositor")]
    EventStreamClosed,

    #[error("Event stream unreachable after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl HyprError {
    /// Whether the compositor could not be reached at all (as opposed to
    /// answering with something unexpected).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HyprError::Transport(_) | HyprError::Timeout { .. } | HyprError::EventStreamClosed
        )
    }
}

/// Locations of one compositor instance's sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyprlandPaths {
    /// Request/reply socket (`.socket.sock`).
    pub control: PathBuf,
    /// Event subscription socket (`.socket2.sock`).
    pub events: PathBuf,
}

impl HyprlandPaths {
    /// Resolve the sockets of the running instance from the environment.
    pub fn from_env() -> Result<Self, HyprError> {
        let signature = std::env::var(INSTANCE_SIGNATURE_VAR).ok();
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from);
        Self::resolve(runtime_dir.as_deref(), signature.as_deref())
    }

    /// Resolve the sockets given the runtime dir and instance signature.
    ///
    /// Newer compositors live under `$XDG_RUNTIME_DIR/hypr`, older ones under
    /// `/tmp/hypr`.
    pub fn resolve(runtime_dir: Option<&Path>, signature: Option<&str>) -> Result<Self, HyprError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(HyprError::MissingInstanceSignature)?;

        let base = runtime_dir
            .map(|dir| dir.join("hypr"))
            .filter(|dir| dir.is_dir())
            .unwrap_or_else(|| PathBuf::from("/tmp/hypr"));

        Ok(Self::in_dir(base.join(signature)))
    }

    /// Sockets inside an explicit instance directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            control: dir.join(".socket.sock"),
            events: dir.join(".socket2.sock"),
        }
    }
}

// ============================================================================
// Reply schemas
// ============================================================================

#[derive(Debug, Deserialize)]
struct WorkspaceReply {
    id: i64,
    name: String,
}

impl From<WorkspaceReply> for WorkspaceRef {
    fn from(ws: WorkspaceReply) -> Self {
        WorkspaceRef::new(ws.id, ws.name)
    }
}

/// Older compositors report a bool, newer ones a fullscreen mode number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FullscreenReply {
    Flag(bool),
    Mode(i64),
}

impl FullscreenReply {
    fn is_fullscreen(&self) -> bool {
        match self {
            FullscreenReply::Flag(flag) => *flag,
            FullscreenReply::Mode(mode) => *mode != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientReply {
    address: String,
    class: String,
    title: String,
    workspace: WorkspaceReply,
    monitor: i64,
    floating: bool,
    fullscreen: FullscreenReply,
    pid: i64,
}

impl From<ClientReply> for Window {
    fn from(c: ClientReply) -> Self {
        Window {
            address: c.address,
            class: c.class,
            title: c.title,
            workspace: c.workspace.into(),
            monitor: c.monitor,
            floating: c.floating,
            fullscreen: c.fullscreen.is_fullscreen(),
            pid: c.pid,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonitorReply {
    id: i64,
    name: String,
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    focused: bool,
    active_workspace: WorkspaceReply,
}

impl From<MonitorReply> for Output {
    fn from(m: MonitorReply) -> Self {
        Output {
            id: m.id,
            name: m.name,
            width: m.width,
            height: m.height,
            x: m.x,
            y: m.y,
            focused: m.focused,
            active_workspace: m.active_workspace.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ActiveWindowReply {
    address: String,
    class: String,
}

fn decode<T: DeserializeOwned>(command: &str, reply: &[u8]) -> Result<T, HyprError> {
    serde_json::from_slice(reply).map_err(|e| HyprError::Protocol {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a `j/clients` reply.
pub fn parse_clients(reply: &[u8]) -> Result<Vec<Window>, HyprError> {
    let clients: Vec<ClientReply> = decode("j/clients", reply)?;
    Ok(clients.into_iter().map(Window::from).collect())
}

/// Decode a `j/monitors` reply.
pub fn parse_monitors(reply: &[u8]) -> Result<Vec<Output>, HyprError> {
    let monitors: Vec<MonitorReply> = decode("j/monitors", reply)?;
    Ok(monitors.into_iter().map(Output::from).collect())
}

/// Decode a `j/activewindow` reply. An empty object means nothing is focused.
pub fn parse_active_window(reply: &[u8]) -> Result<Option<ActiveWindow>, HyprError> {
    let object: serde_json::Map<String, serde_json::Value> = decode("j/activewindow", reply)?;
    if object.is_empty() {
        return Ok(None);
    }
    let active: ActiveWindowReply =
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            HyprError::Protocol {
                command: "j/activewindow".to_string(),
                reason: e.to_string(),
            }
        })?;
    Ok(Some(ActiveWindow {
        address: active.address,
        class: active.class,
    }))
}

// ============================================================================
// Control socket client
// ============================================================================

/// Client for the compositor's control socket.
///
/// Every call opens a fresh connection, writes one request, reads the whole
/// reply and closes. The compositor serves exactly one request per connection.
#[derive(Debug, Clone)]
pub struct HyprClient {
    paths: HyprlandPaths,
    timeout: Duration,
}

impl HyprClient {
    /// Create a client for the given instance.
    pub fn new(paths: HyprlandPaths) -> Self {
        Self {
            paths,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the bound on one round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Socket locations of this instance.
    pub fn paths(&self) -> &HyprlandPaths {
        &self.paths
    }

    /// Send a raw command and return the raw reply.
    pub async fn send_command(&self, command: &str) -> Result<Vec<u8>, HyprError> {
        match tokio::time::timeout(self.timeout, self.round_trip(command)).await {
            Ok(result) => result,
            Err(_) => Err(HyprError::Timeout {
                command: command.to_string(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn round_trip(&self, command: &str) -> Result<Vec<u8>, HyprError> {
        let mut stream = UnixStream::connect(&self.paths.control).await?;
        stream.write_all(command.as_bytes()).await?;

        let mut reply = Vec::with_capacity(4096);
        stream
            .take(MAX_REPLY_SIZE as u64 + 1)
            .read_to_end(&mut reply)
            .await?;

        if reply.len() > MAX_REPLY_SIZE {
            return Err(HyprError::ReplyTooLarge {
                command: command.to_string(),
                limit: MAX_REPLY_SIZE,
            });
        }
        tracing::trace!("{} -> {} bytes", command, reply.len());
        Ok(reply)
    }

    /// All client windows.
    pub async fn clients(&self) -> Result<Vec<Window>, HyprError> {
        parse_clients(&self.send_command("j/clients").await?)
    }

    /// All outputs.
    pub async fn monitors(&self) -> Result<Vec<Output>, HyprError> {
        parse_monitors(&self.send_command("j/monitors").await?)
    }

    /// The focused window, if any.
    pub async fn active_window(&self) -> Result<Option<ActiveWindow>, HyprError> {
        parse_active_window(&self.send_command("j/activewindow").await?)
    }

    /// Run `dispatch <args>` and require an `ok` reply.
    pub async fn dispatch(&self, args: &str) -> Result<(), HyprError> {
        let command = format!("dispatch {}", args);
        let reply = self.send_command(&command).await?;
        let reply = String::from_utf8_lossy(&reply);
        if reply.trim() == "ok" {
            tracing::debug!("{}", command);
            Ok(())
        } else {
            Err(HyprError::CommandRejected {
                command,
                reply: reply.trim().to_string(),
            })
        }
    }

    /// Focus a window.
    pub async fn focus_window(&self, address: &WindowAddress) -> Result<(), HyprError> {
        self.dispatch(&format!("focuswindow address:{}", address)).await
    }

    /// Close a window.
    pub async fn close_window(&self, address: &WindowAddress) -> Result<(), HyprError> {
        self.dispatch(&format!("closewindow address:{}", address)).await
    }

    /// Move a window to a numbered workspace.
    pub async fn move_to_workspace(
        &self,
        address: &WindowAddress,
        workspace: u32,
    ) -> Result<(), HyprError> {
        self.dispatch(&format!("movetoworkspace {},address:{}", workspace, address))
            .await
    }
}
