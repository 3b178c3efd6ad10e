//! hyprdock Core Tasks
//!
//! Platform-agnostic task aggregation engine for the dock.
//!
//! This crate turns a raw compositor snapshot plus the user's pinned list into
//! the ordered presentation list the renderer draws:
//! - Windows are grouped into tasks by their application class
//! - Pinned classes come first, in pin order, even without a live window
//! - Unpinned live tasks follow in a stable order
//!
//! Everything here is recomputed from scratch on every rebuild; nothing is
//! patched in place.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque compositor handle of a window, stable for the window's lifetime.
pub type WindowAddress = String;

/// Number of distinct keys the strip holds before icons start shrinking.
pub const SCALE_THRESHOLD: usize = 6;

/// Every this many keys past the threshold shrink the icons one more step.
pub const SCALE_STEP: usize = 3;

/// Errors that can occur when handling task keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task key must not be empty")]
    EmptyKey,

    #[error("Task key must not contain a line break: {0:?}")]
    MultilineKey(String),
}

/// Validate a grouping key supplied by the user (pin/unpin).
///
/// Returns the trimmed key. Keys are persisted one per line, so line breaks
/// are rejected.
pub fn validate_key(key: &str) -> Result<&str, TaskError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(TaskError::EmptyKey);
    }
    if trimmed.contains('\n') || trimmed.contains('\r') {
        return Err(TaskError::MultilineKey(trimmed.to_string()));
    }
    Ok(trimmed)
}

/// Workspace a window lives on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: i64,
    pub name: String,
}

impl WorkspaceRef {
    /// Create a new workspace reference.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Name without any `:suffix`, e.g. `special` for `special:scratch_term`.
    pub fn base_name(&self) -> &str {
        match self.name.split_once(':') {
            Some((base, _)) => base,
            None => &self.name,
        }
    }
}

/// A window as reported by the compositor.
///
/// Produced wholesale on each snapshot fetch and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Compositor handle.
    pub address: WindowAddress,
    /// Owning application identifier; the grouping key.
    pub class: String,
    /// Display title.
    pub title: String,
    /// Workspace the window is on.
    pub workspace: WorkspaceRef,
    /// Output index.
    pub monitor: i64,
    pub floating: bool,
    pub fullscreen: bool,
    /// Owning process id.
    pub pid: i64,
}

impl Window {
    /// Create a window with the identifying fields set and everything else defaulted.
    pub fn new(
        address: impl Into<WindowAddress>,
        class: impl Into<String>,
        workspace: WorkspaceRef,
    ) -> Self {
        Self {
            address: address.into(),
            class: class.into(),
            title: String::new(),
            workspace,
            monitor: 0,
            floating: false,
            fullscreen: false,
            pid: 0,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Whether the window has a usable grouping key.
    ///
    /// Windows being destroyed are briefly reported with an empty class.
    pub fn has_key(&self) -> bool {
        !self.class.is_empty()
    }
}

/// An output (monitor) as reported by the compositor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub id: i64,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub x: i32,
    pub y: i32,
    pub focused: bool,
    pub active_workspace: WorkspaceRef,
}

/// The focused window at snapshot time.
///
/// Only used for presentation state, never as a join key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub address: WindowAddress,
    pub class: String,
}

/// One consistent-enough read of windows, outputs and the active window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub windows: Vec<Window>,
    pub outputs: Vec<Output>,
    pub active: Option<ActiveWindow>,
}

impl Snapshot {
    /// Number of windows in the snapshot.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Class of the focused window, if there is one with a usable key.
    pub fn active_class(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|a| a.class.as_str())
            .filter(|c| !c.is_empty())
    }
}

/// Drops windows the dock must never show.
///
/// A window is dropped when its class is empty or its workspace is ignored,
/// either by numeric id or by name. Names are compared case-sensitively and
/// only the part before a `:` counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFilter {
    ignored_workspaces: Vec<String>,
}

impl SnapshotFilter {
    /// Create a filter from a list of workspace ids or names.
    pub fn new<I, S>(ignored_workspaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ignored_workspaces = ignored_workspaces
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { ignored_workspaces }
    }

    /// Ignored workspace entries.
    pub fn ignored_workspaces(&self) -> &[String] {
        &self.ignored_workspaces
    }

    /// Check whether a window should be kept.
    pub fn retains(&self, window: &Window) -> bool {
        if !window.has_key() {
            return false;
        }
        !self.is_ignored_workspace(&window.workspace)
    }

    /// Check whether a workspace is on the ignore list.
    pub fn is_ignored_workspace(&self, workspace: &WorkspaceRef) -> bool {
        let id = workspace.id.to_string();
        let base = workspace.base_name();
        self.ignored_workspaces
            .iter()
            .any(|entry| *entry == id || entry == base)
    }

    /// Apply the filter to a freshly fetched window list.
    pub fn apply(&self, windows: Vec<Window>) -> Vec<Window> {
        windows.into_iter().filter(|w| self.retains(w)).collect()
    }
}

/// Where the launcher button goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LauncherPosition {
    Start,
    #[default]
    End,
}

/// Settings the aggregation engine depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base icon size in pixels before scaling.
    pub icon_size: u32,
    /// Command bound to the launcher button.
    ///
    /// Classes contained in this string are not counted as distinct keys.
    pub launcher_command: String,
    /// Whether the launcher entry is emitted at all.
    pub show_launcher: bool,
    pub launcher_position: LauncherPosition,
    /// Suppress the active highlight (auto-hide mode).
    pub suppress_active: bool,
    /// Classes never shown, neither as live tasks nor as pins.
    pub ignored_classes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            icon_size: 48,
            launcher_command: "nwg-drawer".to_string(),
            show_launcher: true,
            launcher_position: LauncherPosition::End,
            suppress_active: false,
            ignored_classes: Vec::new(),
        }
    }
}

/// Windows grouped under one application key; the unit drawn as one dock entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Grouping key. For pinned tasks this is the pin string, which may be a
    /// substring of the member windows' classes.
    pub key: String,
    /// Live windows, in presentation order.
    pub windows: Vec<Window>,
    /// Whether the key is in the pinned set.
    pub pinned: bool,
    /// Whether the task holds the focused window.
    pub active: bool,
}

impl Task {
    /// A pinned entry with no live windows.
    pub fn is_placeholder(&self) -> bool {
        self.windows.is_empty()
    }

    /// The window the entry stands for: the first one, if any.
    pub fn representative(&self) -> Option<&Window> {
        self.windows.first()
    }

    /// Number of live windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn mark_active(&mut self, active_class: Option<&str>) {
        self.active = match active_class {
            Some(class) => self.windows.iter().any(|w| w.class == class),
            None => false,
        };
    }
}

/// One slot in the presentation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DockItem {
    /// The launcher button.
    Launcher,
    /// An application entry.
    Task(Task),
}

impl DockItem {
    /// The task in this slot, if any.
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            DockItem::Task(task) => Some(task),
            DockItem::Launcher => None,
        }
    }
}

/// The ordered render plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationList {
    /// Slots in render order.
    pub items: Vec<DockItem>,
    /// Uniform icon size for this list.
    pub icon_size: u32,
}

impl PresentationList {
    /// Iterate the task slots, skipping the launcher.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.items.iter().filter_map(DockItem::as_task)
    }

    /// Find a task by its key.
    pub fn task(&self, key: &str) -> Option<&Task> {
        self.tasks().find(|t| t.key == key)
    }

    /// Task keys in render order.
    pub fn keys(&self) -> Vec<&str> {
        self.tasks().map(|t| t.key.as_str()).collect()
    }

    /// Number of task slots.
    pub fn task_count(&self) -> usize {
        self.tasks().count()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Compute the uniform icon size for `key_count` distinct keys.
///
/// Icons keep the base size up to [`SCALE_THRESHOLD`] keys, then shrink by
/// `base * 6 / (6 + (count - 6) / 3)` using integer division.
pub fn scaled_icon_size(base: u32, key_count: usize) -> u32 {
    let overflow = key_count.saturating_sub(SCALE_THRESHOLD) / SCALE_STEP;
    let threshold = SCALE_THRESHOLD as u64;
    let scaled = u64::from(base) * threshold / (threshold + overflow as u64);
    // The result never exceeds `base`, so it always fits.
    u32::try_from(scaled).unwrap_or(base)
}

/// Decide whether an event-driven refresh needs a rebuild.
///
/// Focus changes force a rebuild because the active highlight must move even
/// when the window count is unchanged.
pub fn should_rebuild(previous_count: usize, current_count: usize, force: bool) -> bool {
    force || previous_count != current_count
}

/// The task aggregation engine.
#[derive(Debug, Clone, Default)]
pub struct TaskEngine {
    config: EngineConfig,
}

impl TaskEngine {
    /// Create an engine with the given settings.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Current settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the settings (config reload).
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    fn is_ignored_class(&self, class: &str) -> bool {
        self.config.ignored_classes.iter().any(|c| c == class)
    }

    /// Recompute the presentation list from a snapshot and the pinned keys.
    ///
    /// Order: optional leading launcher, pinned tasks in pin order, unpinned
    /// live tasks, optional trailing launcher. A pinned key claims every
    /// not-yet-claimed window whose class contains it, case-insensitively.
    pub fn rebuild(&self, snapshot: &Snapshot, pinned: &[String]) -> PresentationList {
        let mut windows: Vec<&Window> = snapshot
            .windows
            .iter()
            .filter(|w| w.has_key() && !self.is_ignored_class(&w.class))
            .collect();
        // Stable: equal (workspace, class) windows keep compositor order.
        windows.sort_by(|a, b| {
            a.workspace
                .id
                .cmp(&b.workspace.id)
                .then_with(|| a.class.cmp(&b.class))
        });

        let pins = self.effective_pins(pinned);
        let key_count = self.distinct_keys(&pins, &windows).len();
        let icon_size = scaled_icon_size(self.config.icon_size, key_count);

        let active_class = if self.config.suppress_active {
            None
        } else {
            snapshot.active_class()
        };

        let mut items = Vec::with_capacity(pins.len() + windows.len() + 1);
        if self.config.show_launcher && self.config.launcher_position == LauncherPosition::Start {
            items.push(DockItem::Launcher);
        }

        let mut claimed = vec![false; windows.len()];

        for pin in &pins {
            let needle = pin.to_uppercase();
            let mut members = Vec::new();
            for (idx, window) in windows.iter().enumerate() {
                if !claimed[idx] && window.class.to_uppercase().contains(&needle) {
                    claimed[idx] = true;
                    members.push((*window).clone());
                }
            }
            let mut task = Task {
                key: (*pin).to_string(),
                windows: members,
                pinned: true,
                active: false,
            };
            task.mark_active(active_class);
            items.push(DockItem::Task(task));
        }

        let mut live: Vec<Task> = Vec::new();
        for (idx, window) in windows.iter().enumerate() {
            if claimed[idx] {
                continue;
            }
            match live.iter_mut().find(|t| t.key == window.class) {
                Some(task) => task.windows.push((*window).clone()),
                None => live.push(Task {
                    key: window.class.clone(),
                    windows: vec![(*window).clone()],
                    pinned: false,
                    active: false,
                }),
            }
        }
        for mut task in live {
            task.mark_active(active_class);
            items.push(DockItem::Task(task));
        }

        if self.config.show_launcher && self.config.launcher_position == LauncherPosition::End {
            items.push(DockItem::Launcher);
        }

        PresentationList { items, icon_size }
    }

    /// Pinned keys with duplicates, blanks and ignored classes removed.
    fn effective_pins<'a>(&self, pinned: &'a [String]) -> Vec<&'a str> {
        let mut pins: Vec<&str> = Vec::with_capacity(pinned.len());
        for pin in pinned {
            let pin = pin.trim();
            if pin.is_empty() || pins.contains(&pin) || self.is_ignored_class(pin) {
                continue;
            }
            pins.push(pin);
        }
        pins
    }

    /// Distinct keys in encounter order: pins, then live classes.
    ///
    /// Classes contained in the launcher command are skipped so the launcher's
    /// own process does not count against the icon budget.
    fn distinct_keys<'a>(&self, pins: &[&'a str], windows: &[&'a Window]) -> Vec<&'a str> {
        let mut keys: Vec<&str> = pins.to_vec();
        for window in windows {
            let class = window.class.as_str();
            if class.is_empty() || keys.contains(&class) {
                continue;
            }
            if !self.config.launcher_command.is_empty()
                && self.config.launcher_command.contains(class)
            {
                continue;
            }
            keys.push(class);
        }
        keys
    }
}
