//! hyprdock IPC Protocol
//!
//! Shared types for daemon-CLI communication over a local Unix socket.
//!
//! One connection carries one request line and one response line, both
//! JSON terminated by `\n`.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Socket file name inside the runtime directory.
pub const SOCKET_NAME: &str = "hyprdock.sock";

/// Maximum accepted request size in bytes.
pub const MAX_IPC_MESSAGE_SIZE: usize = 64 * 1024;

/// Maximum accepted response size in bytes. Task lists grow with the number
/// of open windows, so replies get a much larger bound than requests.
pub const MAX_IPC_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Path of the daemon's control socket.
///
/// Lives in `$XDG_RUNTIME_DIR`, falling back to the system temp dir when no
/// runtime dir is available.
pub fn socket_path() -> PathBuf {
    directories::BaseDirs::new()
        .and_then(|dirs| dirs.runtime_dir().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(std::env::temp_dir)
        .join(SOCKET_NAME)
}

/// Errors that can occur while encoding or decoding protocol lines.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Message exceeds {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("Empty message")]
    Empty,
}

/// Commands that can be sent from the CLI (or a renderer) to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcCommand {
    /// Toggle dock visibility.
    Toggle,
    /// Show the dock.
    Show,
    /// Hide the dock.
    Hide,

    /// Append a key to the pinned set.
    Pin { key: String },
    /// Remove a key from the pinned set.
    Unpin { key: String },

    /// Primary click on an entry: launch, focus, or list instances.
    Activate { key: String },
    /// Secondary click on an entry: the per-window action menu.
    SecondaryAction { key: String },

    /// Focus a specific window.
    FocusWindow { address: String },
    /// Close a specific window.
    CloseWindow { address: String },
    /// Move a window to a numbered workspace.
    MoveToWorkspace { address: String, workspace: u32 },
    /// Start a new instance of an application.
    Launch { key: String },

    /// Pointer entered the dock surface.
    PointerEnter,
    /// Pointer left the dock surface.
    PointerLeave,

    /// Query the current presentation list.
    QueryTasks,
    /// Re-fetch the compositor state and rebuild.
    Refresh,
    /// Reload configuration and pinned file.
    Reload,
    /// Stop the daemon.
    Stop,
}

/// Screen edge the dock is anchored to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DockPosition {
    #[default]
    Bottom,
    Top,
    Left,
    Right,
}

/// Alignment of the dock along its edge.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DockAlignment {
    Start,
    #[default]
    Center,
    End,
}

/// One window as shown in instance menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub address: String,
    pub class: String,
    pub title: String,
    pub workspace: i64,
}

/// One slot of the dock as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DockEntry {
    /// The launcher button.
    Launcher { command: String },
    /// An application entry.
    Task {
        key: String,
        /// Display name from the desktop entry.
        name: String,
        /// Icon name from the desktop entry.
        icon: String,
        pinned: bool,
        active: bool,
        windows: Vec<WindowSummary>,
    },
}

/// A menu line with the command to send back when it is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub command: IpcCommand,
}

impl MenuEntry {
    pub fn new(label: impl Into<String>, command: IpcCommand) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// Responses from the daemon to the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Command executed successfully.
    Ok,
    /// Command failed with an error.
    Error {
        /// Error message describing what went wrong.
        message: String,
    },
    /// Current presentation list.
    Tasks {
        icon_size: u32,
        visible: bool,
        /// Configured placement, for the renderer.
        #[serde(default)]
        position: DockPosition,
        #[serde(default)]
        alignment: DockAlignment,
        entries: Vec<DockEntry>,
    },
    /// A menu for the caller to present.
    Menu {
        key: String,
        entries: Vec<MenuEntry>,
    },
}

impl IpcResponse {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Serialize a message as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, IpcError> {
    let mut line = serde_json::to_string(message).map_err(IpcError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Parse one request line.
pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, IpcError> {
    decode_bounded(line, MAX_IPC_MESSAGE_SIZE)
}

/// Parse one response line.
pub fn decode_response(line: &str) -> Result<IpcResponse, IpcError> {
    decode_bounded(line, MAX_IPC_RESPONSE_SIZE)
}

fn decode_bounded<T: DeserializeOwned>(line: &str, limit: usize) -> Result<T, IpcError> {
    if line.len() > limit {
        return Err(IpcError::MessageTooLarge { limit });
    }
    let line = line.trim();
    if line.is_empty() {
        return Err(IpcError::Empty);
    }
    serde_json::from_str(line).map_err(IpcError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let cmd = IpcCommand::Toggle;
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"type":"toggle"}"#);

        let cmd2: IpcCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_move_command_serialization() {
        let cmd = IpcCommand::MoveToWorkspace {
            address: "0x1".to_string(),
            workspace: 4,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("move_to_workspace"));
        assert!(json.contains("\"workspace\":4"));

        let cmd2: IpcCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, cmd2);
    }

    #[test]
    fn test_tasks_response_shape() {
        let resp = IpcResponse::Tasks {
            icon_size: 41,
            visible: true,
            position: DockPosition::Left,
            alignment: DockAlignment::Start,
            entries: vec![
                DockEntry::Task {
                    key: "firefox".to_string(),
                    name: "Firefox".to_string(),
                    icon: "firefox".to_string(),
                    pinned: true,
                    active: false,
                    windows: vec![WindowSummary {
                        address: "0x1".to_string(),
                        class: "firefox-esr".to_string(),
                        title: "Start".to_string(),
                        workspace: 2,
                    }],
                },
                DockEntry::Launcher {
                    command: "nwg-drawer".to_string(),
                },
            ],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"tasks\""));
        assert!(json.contains("\"kind\":\"task\""));
        assert!(json.contains("\"kind\":\"launcher\""));
        assert!(json.contains("\"position\":\"left\""));
        assert!(json.contains("\"alignment\":\"start\""));

        let resp2: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_menu_entries_carry_commands() {
        let resp = IpcResponse::Menu {
            key: "kitty".to_string(),
            entries: vec![MenuEntry::new(
                "~ (1)",
                IpcCommand::FocusWindow {
                    address: "0x1".to_string(),
                },
            )],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"type\":\"focus_window\""));
        let resp2: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }

    #[test]
    fn test_error_response() {
        let resp = IpcResponse::error("Something went wrong");
        if let IpcResponse::Error { message } = resp {
            assert_eq!(message, "Something went wrong");
        } else {
            panic!("Expected Error response");
        }
    }

    #[test]
    fn test_line_delimited_protocol() {
        let cmd = IpcCommand::Pin {
            key: "firefox".to_string(),
        };
        let wire = encode_line(&cmd).unwrap();
        assert!(wire.ends_with('\n'));
        assert_eq!(wire.matches('\n').count(), 1);

        let parsed: IpcCommand = decode_line(&wire).unwrap();
        assert_eq!(cmd, parsed);
    }

    #[test]
    fn test_invalid_lines() {
        assert!(matches!(decode_line::<IpcCommand>("  \n"), Err(IpcError::Empty)));
        assert!(matches!(
            decode_line::<IpcCommand>("not valid json"),
            Err(IpcError::Decode(_))
        ));
        assert!(decode_line::<IpcCommand>(r#"{"type": "unknown_command"}"#).is_err());
        assert!(decode_line::<IpcResponse>(r#"{"status": "invalid"}"#).is_err());

        let huge = "x".repeat(MAX_IPC_MESSAGE_SIZE + 1);
        assert!(matches!(
            decode_line::<IpcCommand>(&huge),
            Err(IpcError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_large_task_list_response_decodes() {
        let windows = (0..1000)
            .map(|i| WindowSummary {
                address: format!("0x{:x}", 0x5600_0000 + i),
                class: "kitty".to_string(),
                title: format!("terminal session number {}", i),
                workspace: 1,
            })
            .collect();
        let resp = IpcResponse::Tasks {
            icon_size: 48,
            visible: true,
            position: DockPosition::default(),
            alignment: DockAlignment::default(),
            entries: vec![DockEntry::Task {
                key: "kitty".to_string(),
                name: "kitty".to_string(),
                icon: "kitty".to_string(),
                pinned: false,
                active: true,
                windows,
            }],
        };
        let wire = encode_line(&resp).unwrap();
        assert!(wire.len() > MAX_IPC_MESSAGE_SIZE);

        assert_eq!(decode_response(&wire).unwrap(), resp);
        assert!(matches!(
            decode_line::<IpcResponse>(&wire),
            Err(IpcError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_socket_path_name() {
        let path = socket_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some(SOCKET_NAME));
    }
}
