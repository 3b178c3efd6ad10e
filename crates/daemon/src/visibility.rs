//! Dock visibility: display modes, show/hide requests, and the hide timer.

use crate::config::DisplayMode;
use tracing::debug;

/// A show/hide request from a signal or an IPC client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityRequest {
    Show,
    Hide,
    Toggle,
}

/// Visibility state owned by the event loop.
///
/// Hide timers are tagged with a generation number. Arming a new timer or
/// the pointer re-entering bumps the generation, so a timer that fires late
/// can tell it has been superseded.
#[derive(Debug)]
pub struct Visibility {
    mode: DisplayMode,
    visible: bool,
    pointer_inside: bool,
    generation: u64,
}

impl Visibility {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            mode,
            visible: mode != DisplayMode::Autohide,
            pointer_inside: false,
            generation: 0,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Switch mode (config reload), resetting to the mode's initial state.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        if mode != self.mode {
            *self = Self {
                generation: self.generation + 1,
                ..Self::new(mode)
            };
        }
    }

    /// Apply a request. Returns whether visibility changed.
    ///
    /// Normal docks are always shown and ignore requests.
    pub fn apply(&mut self, request: VisibilityRequest) -> bool {
        if self.mode == DisplayMode::Normal {
            debug!("{:?} received, but the dock is not resident, ignoring", request);
            return false;
        }
        let target = match request {
            VisibilityRequest::Show => true,
            VisibilityRequest::Hide => false,
            VisibilityRequest::Toggle => !self.visible,
        };
        self.set_visible(target)
    }

    /// Pointer entered the dock (or its hotspot). Cancels any pending hide.
    pub fn pointer_enter(&mut self) -> bool {
        self.pointer_inside = true;
        self.generation += 1;
        if self.mode == DisplayMode::Autohide {
            self.set_visible(true)
        } else {
            false
        }
    }

    /// Pointer left the dock. In autohide mode returns the generation of the
    /// hide timer to arm.
    pub fn pointer_leave(&mut self) -> Option<u64> {
        self.pointer_inside = false;
        if self.mode != DisplayMode::Autohide {
            return None;
        }
        self.generation += 1;
        Some(self.generation)
    }

    /// A hide timer fired. Returns whether the dock was hidden.
    pub fn hide_timer_fired(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.pointer_inside {
            debug!("Stale hide timer {} (current {})", generation, self.generation);
            return false;
        }
        self.set_visible(false)
    }

    /// An application was launched from the dock. Autohide docks get out of
    /// the way.
    pub fn after_launch(&mut self) -> bool {
        if self.mode != DisplayMode::Autohide {
            return false;
        }
        self.generation += 1;
        self.set_visible(false)
    }

    fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible == visible {
            return false;
        }
        self.visible = visible;
        debug!("Dock {}", if visible { "shown" } else { "hidden" });
        true
    }
}
