//! Reconciliation trigger: turns compositor events into snapshot fetches.
//!
//! At most one fetch is in flight. Requests arriving meanwhile collapse into a
//! single pending request whose `force` flag is the OR of everything merged
//! into it; it starts as soon as the running fetch completes.

use hyprdock_core::WindowAddress;
use hyprdock_hyprland::HyprEvent;

/// Whether a fetch is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    AwaitingFetch,
}

/// A fetch the caller should start now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Rebuild even when the window count is unchanged.
    pub force: bool,
}

#[derive(Debug)]
pub struct ReconcileTrigger {
    state: TriggerState,
    pending: Option<bool>,
    last_seen: Option<WindowAddress>,
}

impl Default for ReconcileTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconcileTrigger {
    pub fn new() -> Self {
        Self {
            state: TriggerState::Idle,
            pending: None,
            last_seen: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Last focus handle that caused a refresh.
    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Whether a request is queued behind the running fetch.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Classify an event. Returns the `force` flag of the refresh it calls for.
    ///
    /// Focus changes to the handle already seen are dropped. A resync may hide
    /// lost focus events, so it forgets the last handle and forces a rebuild.
    pub fn classify(&mut self, event: &HyprEvent) -> Option<bool> {
        match event {
            HyprEvent::Resync => {
                self.last_seen = None;
                Some(true)
            }
            HyprEvent::ActiveWindow { address } => {
                if self.last_seen.as_deref() == Some(address.as_str()) {
                    return None;
                }
                self.last_seen = Some(address.clone());
                Some(true)
            }
            other if other.changes_window_set() => Some(false),
            _ => None,
        }
    }

    /// Feed an event; returns a fetch to start, if any.
    pub fn on_event(&mut self, event: &HyprEvent) -> Option<FetchRequest> {
        let force = self.classify(event)?;
        self.request(force)
    }

    /// Ask for a refresh. Starts one when idle, otherwise merges into the
    /// pending request.
    pub fn request(&mut self, force: bool) -> Option<FetchRequest> {
        match self.state {
            TriggerState::Idle => {
                self.state = TriggerState::AwaitingFetch;
                Some(FetchRequest { force })
            }
            TriggerState::AwaitingFetch => {
                self.pending = Some(self.pending.unwrap_or(false) || force);
                None
            }
        }
    }

    /// The running fetch finished (successfully or not). Returns the pending
    /// request to start next, if any.
    pub fn complete(&mut self) -> Option<FetchRequest> {
        match self.pending.take() {
            Some(force) => Some(FetchRequest { force }),
            None => {
                self.state = TriggerState::Idle;
                None
            }
        }
    }
}
