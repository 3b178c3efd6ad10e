//! Integration tests for the hyprdock daemon.
//!
//! The protocol tests check the wire format clients rely on. The end-to-end
//! test starts the daemon binary against a fake compositor bound inside a
//! temp dir and drives it over the IPC socket.

use hyprdock_ipc::{
    decode_line, decode_response, encode_line, DockAlignment, DockEntry, DockPosition, IpcCommand,
    IpcError, IpcResponse, MenuEntry, WindowSummary,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

// ============================================================================
// IPC Protocol Tests
// ============================================================================

/// Test that all IPC commands survive a trip through the line codec.
#[test]
fn test_all_commands_roundtrip() {
    let key = || "firefox".to_string();
    let address = || "0x55d4".to_string();
    let commands = vec![
        IpcCommand::Toggle,
        IpcCommand::Show,
        IpcCommand::Hide,
        IpcCommand::Pin { key: key() },
        IpcCommand::Unpin { key: key() },
        IpcCommand::Activate { key: key() },
        IpcCommand::SecondaryAction { key: key() },
        IpcCommand::FocusWindow { address: address() },
        IpcCommand::CloseWindow { address: address() },
        IpcCommand::MoveToWorkspace {
            address: address(),
            workspace: 4,
        },
        IpcCommand::Launch { key: key() },
        IpcCommand::PointerEnter,
        IpcCommand::PointerLeave,
        IpcCommand::QueryTasks,
        IpcCommand::Refresh,
        IpcCommand::Reload,
        IpcCommand::Stop,
    ];

    for cmd in commands {
        let line = encode_line(&cmd).expect("encode");
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1, "{:?} spans lines", cmd);
        let parsed: IpcCommand = decode_line(&line).expect("decode");
        assert_eq!(parsed, cmd);
    }
}

/// Test the exact JSON shape of commands with fields.
#[test]
fn test_command_wire_format() {
    let json = serde_json::to_string(&IpcCommand::MoveToWorkspace {
        address: "0x1".to_string(),
        workspace: 3,
    })
    .unwrap();
    assert_eq!(
        json,
        r#"{"type":"move_to_workspace","address":"0x1","workspace":3}"#
    );

    let cmd: IpcCommand = serde_json::from_str(r#"{"type":"secondary_action","key":"kitty"}"#).unwrap();
    assert_eq!(
        cmd,
        IpcCommand::SecondaryAction {
            key: "kitty".to_string()
        }
    );
}

/// Test the tagged response shapes.
#[test]
fn test_response_wire_format() {
    let response = IpcResponse::Tasks {
        icon_size: 45,
        visible: true,
        position: DockPosition::Bottom,
        alignment: DockAlignment::Center,
        entries: vec![
            DockEntry::Task {
                key: "kitty".to_string(),
                name: "kitty".to_string(),
                icon: "kitty".to_string(),
                pinned: false,
                active: true,
                windows: vec![WindowSummary {
                    address: "0x1".to_string(),
                    class: "kitty".to_string(),
                    title: "~".to_string(),
                    workspace: 1,
                }],
            },
            DockEntry::Launcher {
                command: "nwg-drawer".to_string(),
            },
        ],
    };
    let value: serde_json::Value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["status"], "tasks");
    assert_eq!(value["entries"][0]["kind"], "task");
    assert_eq!(value["entries"][0]["windows"][0]["workspace"], 1);
    assert_eq!(value["entries"][1]["kind"], "launcher");

    let menu = IpcResponse::Menu {
        key: "kitty".to_string(),
        entries: vec![MenuEntry::new(
            "Close",
            IpcCommand::CloseWindow {
                address: "0x1".to_string(),
            },
        )],
    };
    let value: serde_json::Value = serde_json::to_value(&menu).unwrap();
    assert_eq!(value["entries"][0]["command"]["type"], "close_window");

    let error = serde_json::to_string(&IpcResponse::error("No dock entry for x")).unwrap();
    assert_eq!(error, r#"{"status":"error","message":"No dock entry for x"}"#);
}

/// Test that malformed lines are rejected with the right error.
#[test]
fn test_malformed_lines() {
    assert!(matches!(decode_line::<IpcCommand>("\n"), Err(IpcError::Empty)));
    assert!(matches!(
        decode_line::<IpcCommand>(r#"{"type":"explode"}"#),
        Err(IpcError::Decode(_))
    ));
    assert!(matches!(
        decode_line::<IpcCommand>(r#"{"type":"pin"}"#),
        Err(IpcError::Decode(_))
    ));
}

// ============================================================================
// End-to-end
// ============================================================================

const CLIENTS: &str = r#"[
    {"address": "0x1", "class": "kitty", "title": "~", "workspace": {"id": 1, "name": "1"},
     "monitor": 0, "floating": false, "fullscreen": false, "pid": 100},
    {"address": "0x2", "class": "firefox", "title": "Mozilla Firefox",
     "workspace": {"id": 2, "name": "2"}, "monitor": 0, "floating": false,
     "fullscreen": 0, "pid": 200}
]"#;

const MONITORS: &str = r#"[
    {"id": 0, "name": "DP-1", "width": 2560, "height": 1440, "x": 0, "y": 0,
     "focused": true, "activeWorkspace": {"id": 1, "name": "1"}}
]"#;

const FIREFOX_ACTIVE: &str = r#"{"address": "0x2", "class": "firefox"}"#;

/// Answers control requests from a reply table and fans event lines out to
/// every subscriber.
struct FakeCompositor {
    replies: Arc<Mutex<HashMap<String, String>>>,
    requests: Arc<Mutex<Vec<String>>>,
    subscribers: Arc<tokio::sync::Mutex<Vec<UnixStream>>>,
}

impl FakeCompositor {
    fn start(dir: &Path) -> Self {
        let replies = Arc::new(Mutex::new(HashMap::from([
            ("j/clients".to_string(), CLIENTS.to_string()),
            ("j/monitors".to_string(), MONITORS.to_string()),
            ("j/activewindow".to_string(), "{}".to_string()),
        ])));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let control = UnixListener::bind(dir.join(".socket.sock")).unwrap();
        let table = Arc::clone(&replies);
        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = control.accept().await {
                let mut buf = vec![0u8; 1024];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                log.lock().unwrap().push(request.clone());
                let reply = if request.starts_with("dispatch ") {
                    Some("ok".to_string())
                } else {
                    table.lock().unwrap().get(&request).cloned()
                };
                if let Some(reply) = reply {
                    let _ = stream.write_all(reply.as_bytes()).await;
                }
                let _ = stream.shutdown().await;
            }
        });

        let events = UnixListener::bind(dir.join(".socket2.sock")).unwrap();
        let subs = Arc::clone(&subscribers);
        tokio::spawn(async move {
            while let Ok((stream, _)) = events.accept().await {
                subs.lock().await.push(stream);
            }
        });

        Self {
            replies,
            requests,
            subscribers,
        }
    }

    fn set_reply(&self, request: &str, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(request.to_string(), reply.to_string());
    }

    fn saw(&self, request: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|r| r == request)
    }

    async fn emit(&self, line: &str) {
        for _ in 0..100 {
            let mut subscribers = self.subscribers.lock().await;
            if !subscribers.is_empty() {
                for stream in subscribers.iter_mut() {
                    stream.write_all(line.as_bytes()).await.unwrap();
                }
                return;
            }
            drop(subscribers);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Daemon never subscribed to events");
    }
}

async fn send(socket: &Path, cmd: &IpcCommand) -> IpcResponse {
    let stream = UnixStream::connect(socket).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer
        .write_all(encode_line(cmd).unwrap().as_bytes())
        .await
        .unwrap();
    let mut line = String::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        BufReader::new(reader).read_line(&mut line),
    )
    .await
    .unwrap()
    .unwrap();
    decode_response(&line).unwrap()
}

async fn wait_for_socket(socket: &Path) {
    for _ in 0..200 {
        if UnixStream::connect(socket).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("Daemon did not open {}", socket.display());
}

/// (key, window count, pinned, active) per task entry.
fn task_slots(response: &IpcResponse) -> Vec<(String, usize, bool, bool)> {
    let IpcResponse::Tasks { entries, .. } = response else {
        panic!("Expected tasks response, got {:?}", response);
    };
    entries
        .iter()
        .filter_map(|entry| match entry {
            DockEntry::Task {
                key,
                pinned,
                active,
                windows,
                ..
            } => Some((key.clone(), windows.len(), *pinned, *active)),
            DockEntry::Launcher { .. } => None,
        })
        .collect()
}

fn write_config(dir: &Path, pinned: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        "[dock]\nshow_launcher = false\n\n[behavior]\nreconcile_interval_secs = 0\npinned_file = \"{}\"\n",
        pinned.display()
    );
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_daemon_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let instance = dir.path().join("hypr").join("e2e");
    std::fs::create_dir_all(&instance).unwrap();
    let compositor = FakeCompositor::start(&instance);

    let pinned = dir.path().join("pinned");
    std::fs::write(&pinned, "firefox\n").unwrap();
    let config = write_config(dir.path(), &pinned);

    let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_hyprdock"))
        .arg("--config")
        .arg(&config)
        .env("HYPRLAND_INSTANCE_SIGNATURE", "e2e")
        .env("XDG_RUNTIME_DIR", dir.path())
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_DATA_DIRS", dir.path().join("share"))
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let socket = dir.path().join("hyprdock.sock");
    wait_for_socket(&socket).await;

    // Pinned entries come first and claim their windows.
    let tasks = send(&socket, &IpcCommand::QueryTasks).await;
    assert_eq!(
        task_slots(&tasks),
        vec![
            ("firefox".to_string(), 1, true, false),
            ("kitty".to_string(), 1, false, false),
        ]
    );

    // Pinning persists and shows a placeholder.
    let pin = IpcCommand::Pin {
        key: "foo".to_string(),
    };
    assert_eq!(send(&socket, &pin).await, IpcResponse::Ok);
    assert_eq!(std::fs::read_to_string(&pinned).unwrap(), "firefox\nfoo\n");
    let tasks = send(&socket, &IpcCommand::QueryTasks).await;
    assert!(task_slots(&tasks).contains(&("foo".to_string(), 0, true, false)));

    let unpin = IpcCommand::Unpin {
        key: "foo".to_string(),
    };
    assert_eq!(send(&socket, &unpin).await, IpcResponse::Ok);
    assert_eq!(std::fs::read_to_string(&pinned).unwrap(), "firefox\n");

    // A single window is focused through the compositor.
    let activate = IpcCommand::Activate {
        key: "kitty".to_string(),
    };
    assert_eq!(send(&socket, &activate).await, IpcResponse::Ok);
    assert!(compositor.saw("dispatch focuswindow address:0x1"));

    // A focus change on the event stream forces a rebuild.
    compositor.set_reply("j/activewindow", FIREFOX_ACTIVE);
    compositor.emit("activewindowv2>>2\n").await;
    let mut active = false;
    for _ in 0..100 {
        let tasks = send(&socket, &IpcCommand::QueryTasks).await;
        if task_slots(&tasks).contains(&("firefox".to_string(), 1, true, true)) {
            active = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(active, "focus change never reached the dock");

    // Unknown keys are reported, not fatal.
    let response = send(
        &socket,
        &IpcCommand::SecondaryAction {
            key: "steam".to_string(),
        },
    )
    .await;
    assert!(matches!(response, IpcResponse::Error { .. }));

    assert_eq!(send(&socket, &IpcCommand::Stop).await, IpcResponse::Ok);
    let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(status.success());
    assert!(!socket.exists());
}

#[tokio::test]
async fn test_daemon_requires_compositor() {
    let dir = tempfile::tempdir().unwrap();
    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_hyprdock"))
        .env_remove("HYPRLAND_INSTANCE_SIGNATURE")
        .env("XDG_RUNTIME_DIR", dir.path())
        .env("HOME", dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .unwrap();
    assert!(!status.success());
}
