//! hyprdock CLI
//!
//! Command-line interface for controlling the hyprdock daemon.
//!
//! Each invocation sends one command over the daemon's Unix socket and
//! prints the reply.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hyprdock_ipc::{
    decode_response, encode_line, DockEntry, IpcCommand, IpcResponse, MenuEntry,
    MAX_IPC_RESPONSE_SIZE,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// How long to wait for the daemon's reply.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "hyprdock-cli")]
#[command(author, version, about = "Control the hyprdock daemon")]
struct Cli {
    /// Daemon socket (default: $XDG_RUNTIME_DIR/hyprdock.sock)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Print raw JSON replies
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Toggle dock visibility
    Toggle,
    /// Show the dock
    Show,
    /// Hide the dock
    Hide,
    /// Pin an application
    Pin {
        /// Application class
        key: String,
    },
    /// Unpin an application
    Unpin {
        /// Application class
        key: String,
    },
    /// Click an entry: launch, focus, or list its windows
    Activate { key: String },
    /// Show the action menu of an entry
    Menu { key: String },
    /// Focus a window by address
    Focus { address: String },
    /// Close a window by address
    Close { address: String },
    /// Move a window to a numbered workspace
    Move {
        address: String,
        /// Target workspace (1-based)
        workspace: u32,
    },
    /// Start a new instance of an application
    Launch { key: String },
    /// List dock entries
    Tasks,
    /// Re-read compositor state
    Refresh,
    /// Reload configuration
    Reload,
    /// Stop the daemon
    Stop,
}

impl Commands {
    fn into_ipc(self) -> IpcCommand {
        match self {
            Commands::Toggle => IpcCommand::Toggle,
            Commands::Show => IpcCommand::Show,
            Commands::Hide => IpcCommand::Hide,
            Commands::Pin { key } => IpcCommand::Pin { key },
            Commands::Unpin { key } => IpcCommand::Unpin { key },
            Commands::Activate { key } => IpcCommand::Activate { key },
            Commands::Menu { key } => IpcCommand::SecondaryAction { key },
            Commands::Focus { address } => IpcCommand::FocusWindow { address },
            Commands::Close { address } => IpcCommand::CloseWindow { address },
            Commands::Move { address, workspace } => {
                IpcCommand::MoveToWorkspace { address, workspace }
            }
            Commands::Launch { key } => IpcCommand::Launch { key },
            Commands::Tasks => IpcCommand::QueryTasks,
            Commands::Refresh => IpcCommand::Refresh,
            Commands::Reload => IpcCommand::Reload,
            Commands::Stop => IpcCommand::Stop,
        }
    }
}

async fn send_command(socket: &Path, cmd: &IpcCommand) -> Result<IpcResponse> {
    let stream = UnixStream::connect(socket).await.with_context(|| {
        format!(
            "Failed to connect to {}. Is the hyprdock daemon running?",
            socket.display()
        )
    })?;
    let (reader, mut writer) = stream.into_split();
    writer.write_all(encode_line(cmd)?.as_bytes()).await?;

    let mut line = String::new();
    let mut reader = BufReader::new(reader.take(MAX_IPC_RESPONSE_SIZE as u64));
    tokio::time::timeout(REPLY_TIMEOUT, reader.read_line(&mut line))
        .await
        .context("Timed out waiting for the daemon")??;
    Ok(decode_response(&line)?)
}

fn format_entries(entries: &[DockEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match entry {
            DockEntry::Launcher { command } => format!("[launcher] {}", command),
            DockEntry::Task {
                key,
                name,
                pinned,
                active,
                windows,
                ..
            } => {
                let mut line = format!("{} ({})", key, name);
                if *pinned {
                    line.push_str(" [pinned]");
                }
                if *active {
                    line.push_str(" [active]");
                }
                line.push_str(&format!(" {} window(s)", windows.len()));
                for window in windows {
                    line.push_str(&format!(
                        "\n    {} ws {}: {}",
                        window.address, window.workspace, window.title
                    ));
                }
                line
            }
        })
        .collect()
}

fn format_menu(entries: &[MenuEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match serde_json::to_string(&entry.command) {
            Ok(json) => format!("{:<32} {}", entry.label, json),
            Err(_) => entry.label.clone(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(hyprdock_ipc::socket_path);

    let response = send_command(&socket, &cli.command.into_ipc()).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        if let IpcResponse::Error { .. } = response {
            std::process::exit(1);
        }
        return Ok(());
    }

    match response {
        IpcResponse::Ok => println!("OK"),
        IpcResponse::Error { message } => bail!("{}", message),
        IpcResponse::Tasks {
            icon_size,
            visible,
            position,
            alignment,
            entries,
        } => {
            println!(
                "{} entries, {}px, {:?}/{:?}, {}",
                entries.len(),
                icon_size,
                position,
                alignment,
                if visible { "visible" } else { "hidden" }
            );
            for line in format_entries(&entries) {
                println!("  {}", line);
            }
        }
        IpcResponse::Menu { key, entries } => {
            println!("{}:", key);
            for line in format_menu(&entries) {
                println!("  {}", line);
            }
        }
    }

    Ok(())
}
