//! Unix signal handling.
//!
//! Real-time signals map to visibility requests, which are posted to the
//! single-slot request channel; termination signals shut the daemon down.

use crate::visibility::VisibilityRequest;
use crate::DaemonEvent;
use nix::sys::signal::Signal;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Sender half of the visibility request slot.
pub type RequestSlot = Arc<watch::Sender<Option<VisibilityRequest>>>;

/// Request carried by `SIGRTMIN + offset`.
pub fn request_for_offset(offset: i32) -> Option<VisibilityRequest> {
    match offset {
        1 => Some(VisibilityRequest::Toggle),
        2 => Some(VisibilityRequest::Show),
        3 => Some(VisibilityRequest::Hide),
        _ => None,
    }
}

fn rt_signal(offset: i32) -> std::io::Result<SignalStream> {
    signal(SignalKind::from_raw(nix::libc::SIGRTMIN() + offset))
}

/// Install signal handlers and forward what they receive until the daemon
/// stops listening.
pub(crate) fn spawn_signal_listener(
    requests: RequestSlot,
    event_tx: mpsc::Sender<DaemonEvent>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let mut toggle = rt_signal(1)?;
    let mut show = rt_signal(2)?;
    let mut hide = rt_signal(3)?;
    let mut legacy_toggle = signal(SignalKind::from_raw(Signal::SIGUSR1 as i32))?;
    let mut terminate = signal(SignalKind::from_raw(Signal::SIGTERM as i32))?;

    Ok(tokio::spawn(async move {
        loop {
            let offset = tokio::select! {
                _ = toggle.recv() => 1,
                _ = show.recv() => 2,
                _ = hide.recv() => 3,
                _ = legacy_toggle.recv() => {
                    warn!("SIGUSR1 is deprecated, use SIGRTMIN+1 to toggle the dock");
                    1
                }
                _ = terminate.recv() => {
                    info!("SIGTERM received, initiating shutdown...");
                    let _ = event_tx.send(DaemonEvent::Shutdown).await;
                    break;
                }
            };
            if let Some(request) = request_for_offset(offset) {
                info!("Signal requested {:?}", request);
                requests.send_replace(Some(request));
            }
        }
    }))
}
