//! Event socket decoding and the reconnecting event pump.

use std::path::PathBuf;
use std::time::Duration;

use hyprdock_core::WindowAddress;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::HyprError;

/// Separator between event name and payload.
const EVENT_SEPARATOR: &str = ">>";

/// One decoded compositor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HyprEvent {
    /// Focus moved to another window. An empty address means no window.
    ActiveWindow { address: WindowAddress },
    /// A window was mapped.
    OpenWindow {
        address: WindowAddress,
        workspace: String,
        class: String,
        title: String,
    },
    /// A window was unmapped.
    CloseWindow { address: WindowAddress },
    /// A window changed workspace.
    MoveWindow {
        address: WindowAddress,
        workspace: String,
    },
    /// The stream was re-established; events may have been missed.
    Resync,
    /// Anything the dock does not react to.
    Other { name: String },
}

impl HyprEvent {
    /// Decode one `NAME>>DATA` line.
    ///
    /// Returns `None` for blank lines, lines without a separator, and focus
    /// events whose handle was split across two reads (it still carries `>>`).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (name, data) = line.split_once(EVENT_SEPARATOR)?;
        if name.is_empty() {
            return None;
        }

        let event = match name {
            "activewindowv2" => {
                let address = data.trim();
                if address.contains(EVENT_SEPARATOR) {
                    debug!("Discarding truncated focus event: {:?}", line);
                    return None;
                }
                HyprEvent::ActiveWindow {
                    address: normalize_address(address),
                }
            }
            "openwindow" => {
                // Titles may contain commas, so only split off the first three fields.
                let mut fields = data.splitn(4, ',');
                let address = fields.next().unwrap_or_default();
                let workspace = fields.next().unwrap_or_default();
                let class = fields.next().unwrap_or_default();
                let title = fields.next().unwrap_or_default();
                HyprEvent::OpenWindow {
                    address: normalize_address(address),
                    workspace: workspace.to_string(),
                    class: class.to_string(),
                    title: title.to_string(),
                }
            }
            "closewindow" => HyprEvent::CloseWindow {
                address: normalize_address(data.trim()),
            },
            "movewindow" => {
                let (address, workspace) = data.split_once(',').unwrap_or((data, ""));
                HyprEvent::MoveWindow {
                    address: normalize_address(address),
                    workspace: workspace.to_string(),
                }
            }
            other => HyprEvent::Other {
                name: other.to_string(),
            },
        };
        Some(event)
    }

    /// Whether the event changes which windows exist or where they are.
    pub fn changes_window_set(&self) -> bool {
        matches!(
            self,
            HyprEvent::OpenWindow { .. }
                | HyprEvent::CloseWindow { .. }
                | HyprEvent::MoveWindow { .. }
        )
    }
}

/// Event payloads carry bare hex handles while queries report `0x`-prefixed
/// ones; prefix so both compare equal.
fn normalize_address(raw: &str) -> WindowAddress {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0x") {
        raw.to_string()
    } else {
        format!("0x{}", raw)
    }
}

/// Reconnect policy for the event pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPumpConfig {
    /// Delay after the first failed connect.
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts.
    pub max_backoff: Duration,
    /// Consecutive failed connects before giving up.
    pub max_failures: u32,
}

impl Default for EventPumpConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
            max_failures: 10,
        }
    }
}

/// Stream compositor events into `tx` until the receiver goes away.
///
/// The connection is re-established with exponential backoff whenever it
/// drops; a [`HyprEvent::Resync`] is sent after every reconnect. Returns
/// `Ok(())` once `tx` is closed, or [`HyprError::ReconnectExhausted`] after
/// `max_failures` consecutive failed connects.
pub async fn run_event_pump(
    socket: PathBuf,
    config: EventPumpConfig,
    tx: mpsc::Sender<HyprEvent>,
) -> Result<(), HyprError> {
    let mut failures: u32 = 0;
    let mut backoff = config.initial_backoff;
    let mut connected_before = false;

    loop {
        let stream = match UnixStream::connect(&socket).await {
            Ok(stream) => stream,
            Err(e) => {
                failures += 1;
                if failures >= config.max_failures {
                    return Err(HyprError::ReconnectExhausted { attempts: failures });
                }
                warn!(
                    "Event socket {} unreachable ({}), retry {} in {:?}",
                    socket.display(),
                    e,
                    failures,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
                continue;
            }
        };

        failures = 0;
        backoff = config.initial_backoff;
        info!("Subscribed to compositor events at {}", socket.display());

        if connected_before && tx.send(HyprEvent::Resync).await.is_err() {
            return Ok(());
        }
        connected_before = true;

        match read_events(stream, &tx).await {
            Ok(ReadOutcome::ReceiverGone) => return Ok(()),
            Ok(ReadOutcome::Closed) => {
                warn!("{}, reconnecting", HyprError::EventStreamClosed);
            }
            Err(e) => {
                warn!("Event stream read failed: {}, reconnecting", e);
            }
        }
    }
}

enum ReadOutcome {
    Closed,
    ReceiverGone,
}

async fn read_events(
    stream: UnixStream,
    tx: &mpsc::Sender<HyprEvent>,
) -> Result<ReadOutcome, HyprError> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        let line = String::from_utf8_lossy(&buf);
        let Some(event) = HyprEvent::parse(&line) else {
            continue;
        };
        if tx.send(event).await.is_err() {
            return Ok(ReadOutcome::ReceiverGone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;

    #[test]
    fn test_parse_focus_event() {
        assert_eq!(
            HyprEvent::parse("activewindowv2>>55d0c1a2b3c4\n"),
            Some(HyprEvent::ActiveWindow {
                address: "0x55d0c1a2b3c4".to_string()
            })
        );
        assert_eq!(
            HyprEvent::parse("activewindowv2>>"),
            Some(HyprEvent::ActiveWindow {
                address: String::new()
            })
        );
    }

    #[test]
    fn test_parse_discards_truncated_focus_event() {
        assert_eq!(HyprEvent::parse("activewindowv2>>abc>>def"), None);
    }

    #[test]
    fn test_parse_open_window_with_comma_in_title() {
        let event = HyprEvent::parse("openwindow>>80e62df0,2,kitty,vim a, b").unwrap();
        assert_eq!(
            event,
            HyprEvent::OpenWindow {
                address: "0x80e62df0".to_string(),
                workspace: "2".to_string(),
                class: "kitty".to_string(),
                title: "vim a, b".to_string(),
            }
        );
        assert!(event.changes_window_set());
    }

    #[test]
    fn test_parse_close_and_move() {
        assert_eq!(
            HyprEvent::parse("closewindow>>80e62df0"),
            Some(HyprEvent::CloseWindow {
                address: "0x80e62df0".to_string()
            })
        );
        assert_eq!(
            HyprEvent::parse("movewindow>>80e62df0,special:scratch"),
            Some(HyprEvent::MoveWindow {
                address: "0x80e62df0".to_string(),
                workspace: "special:scratch".to_string()
            })
        );
    }

    #[test]
    fn test_parse_other_and_garbage() {
        let event = HyprEvent::parse("workspace>>3").unwrap();
        assert_eq!(
            event,
            HyprEvent::Other {
                name: "workspace".to_string()
            }
        );
        assert!(!event.changes_window_set());
        assert_eq!(HyprEvent::parse(""), None);
        assert_eq!(HyprEvent::parse("no separator"), None);
        assert_eq!(HyprEvent::parse(">>data"), None);
    }

    #[tokio::test]
    async fn test_pump_delivers_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"workspace>>2\nactivewindowv2>>abc\nclosewindow>>abc\n")
                .await
                .unwrap();
            // Keep the connection open until the test is done.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, mut rx) = mpsc::channel(8);
        let pump = tokio::spawn(run_event_pump(path, EventPumpConfig::default(), tx));

        assert!(matches!(rx.recv().await, Some(HyprEvent::Other { .. })));
        assert_eq!(
            rx.recv().await,
            Some(HyprEvent::ActiveWindow {
                address: "0xabc".to_string()
            })
        );
        assert!(matches!(rx.recv().await, Some(HyprEvent::CloseWindow { .. })));

        pump.abort();
        server.abort();
    }

    #[tokio::test]
    async fn test_pump_resyncs_after_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            // First connection closes immediately, second one stays up.
            let first = listener.accept().await.unwrap();
            drop(first);
            let (_second, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, mut rx) = mpsc::channel(8);
        let config = EventPumpConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_failures: 3,
        };
        let pump = tokio::spawn(run_event_pump(path, config, tx));

        assert_eq!(rx.recv().await, Some(HyprEvent::Resync));
        pump.abort();
        server.abort();
    }

    #[tokio::test]
    async fn test_pump_gives_up_after_repeated_failures() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let config = EventPumpConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            max_failures: 3,
        };
        let result = run_event_pump(dir.path().join("missing.sock"), config, tx).await;
        assert!(matches!(
            result,
            Err(HyprError::ReconnectExhausted { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_pump_stops_when_receiver_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".socket2.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = stream.write_all(b"closewindow>>1\n").await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = run_event_pump(path, EventPumpConfig::default(), tx).await;
        assert!(result.is_ok());
        server.abort();
    }
}
