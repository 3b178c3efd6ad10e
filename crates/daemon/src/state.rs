//! Dock state owned by the event loop, and the actions a renderer can take.

use crate::config::{Config, WindowRules};
use crate::desktop::{DesktopCatalog, LaunchCommand};
use crate::pins::PinnedSet;
use hyprdock_core::{
    should_rebuild, DockItem, PresentationList, Snapshot, Task, TaskEngine, TaskError, Window,
    WindowAddress,
};
use hyprdock_ipc::{DockEntry, IpcCommand, MenuEntry, WindowSummary};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Longest window title shown in menus, in characters.
const MENU_TITLE_CHARS: usize = 20;

/// Errors from dock actions.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No dock entry for {0}")]
    UnknownTask(String),

    #[error("No launch command for {0}")]
    NotLaunchable(String),

    #[error(transparent)]
    InvalidKey(#[from] TaskError),
}

/// What a primary click on an entry resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Pinned entry without windows: start the application.
    Launch(LaunchCommand),
    /// Single window: focus it.
    Focus(WindowAddress),
    /// Several windows: let the user pick one.
    Menu(Vec<MenuEntry>),
}

/// Callbacks the renderer wires to input events.
pub trait DockActions {
    /// Primary click.
    fn on_activate(&mut self, key: &str) -> Result<Activation, ActionError>;
    /// Secondary click: the per-window action menu.
    fn on_secondary_action(&mut self, key: &str) -> Result<Vec<MenuEntry>, ActionError>;
    /// Pin a key, persist, rebuild.
    fn on_pin(&mut self, key: &str) -> Result<(), ActionError>;
    /// Unpin a key, persist, rebuild.
    fn on_unpin(&mut self, key: &str) -> Result<(), ActionError>;
}

/// Windows, pins and the current presentation list.
///
/// Only the event loop touches this; everything else talks to the loop
/// through channels.
pub struct DockState {
    config: Config,
    rules: WindowRules,
    engine: TaskEngine,
    pins: PinnedSet,
    snapshot: Snapshot,
    list: Arc<PresentationList>,
    list_tx: watch::Sender<Arc<PresentationList>>,
    desktop: DesktopCatalog,
}

impl DockState {
    pub fn new(config: Config, pins: PinnedSet, desktop: DesktopCatalog) -> Self {
        let list = Arc::new(PresentationList::default());
        let (list_tx, _) = watch::channel(Arc::clone(&list));
        Self {
            rules: WindowRules::compile(&config.window_rules),
            engine: TaskEngine::new(config.engine_config()),
            config,
            pins,
            snapshot: Snapshot::default(),
            list,
            list_tx,
            desktop,
        }
    }

    /// Subscribe to rebuilt presentation lists.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PresentationList>> {
        self.list_tx.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The list the renderer should currently show.
    pub fn presentation(&self) -> Arc<PresentationList> {
        Arc::clone(&self.list)
    }

    /// Take in a freshly fetched snapshot. Returns whether a rebuild ran.
    ///
    /// Unforced refreshes only rebuild when the number of windows changed.
    pub fn apply_snapshot(&mut self, mut snapshot: Snapshot, force: bool) -> bool {
        snapshot.windows.retain(|w| self.rules.retains(w));
        let previous = self.snapshot.window_count();
        let current = snapshot.window_count();
        self.snapshot = snapshot;
        if should_rebuild(previous, current, force) {
            self.rebuild();
            true
        } else {
            debug!("Window count unchanged ({}), skipping rebuild", current);
            false
        }
    }

    /// Recompute the presentation list and notify subscribers.
    pub fn rebuild(&mut self) {
        let list = Arc::new(self.engine.rebuild(&self.snapshot, self.pins.keys()));
        debug!(
            "Rebuilt {} entries at {}px",
            list.items.len(),
            list.icon_size
        );
        self.list = Arc::clone(&list);
        self.list_tx.send_replace(list);
    }

    /// Swap in a reloaded config and pinned set, then rebuild.
    pub fn reload(&mut self, config: Config, pins: PinnedSet) {
        self.rules = WindowRules::compile(&config.window_rules);
        self.engine.set_config(config.engine_config());
        self.config = config;
        self.pins = pins;
        self.desktop.clear();
        info!(
            "Reloaded: {} window rule(s), {} pinned item(s)",
            self.rules.len(),
            self.pins.keys().len()
        );
        self.rebuild();
    }

    /// Command that starts a new instance of `key`.
    pub fn launch_command(&mut self, key: &str) -> Result<LaunchCommand, ActionError> {
        self.desktop
            .lookup(key)
            .launch_command()
            .ok_or_else(|| ActionError::NotLaunchable(key.to_string()))
    }

    /// The presentation list with desktop names and icons, for clients.
    pub fn dock_entries(&mut self) -> Vec<DockEntry> {
        let list = Arc::clone(&self.list);
        list.items
            .iter()
            .map(|item| match item {
                DockItem::Launcher => DockEntry::Launcher {
                    command: self.config.dock.launcher_command.clone(),
                },
                DockItem::Task(task) => {
                    let entry = self.desktop.lookup(&task.key);
                    DockEntry::Task {
                        key: task.key.clone(),
                        name: entry.name.clone(),
                        icon: entry.icon.clone(),
                        pinned: task.pinned,
                        active: task.active,
                        windows: task.windows.iter().map(summarize).collect(),
                    }
                }
            })
            .collect()
    }

    fn task(&self, key: &str) -> Result<&Task, ActionError> {
        self.list
            .task(key)
            .ok_or_else(|| ActionError::UnknownTask(key.to_string()))
    }
}

impl DockActions for DockState {
    fn on_activate(&mut self, key: &str) -> Result<Activation, ActionError> {
        let task = self.task(key)?;
        match task.windows.as_slice() {
            [] => {
                let key = task.key.clone();
                Ok(Activation::Launch(self.launch_command(&key)?))
            }
            [window] => Ok(Activation::Focus(window.address.clone())),
            windows => Ok(Activation::Menu(
                windows
                    .iter()
                    .map(|w| {
                        MenuEntry::new(
                            menu_label(w),
                            IpcCommand::FocusWindow {
                                address: w.address.clone(),
                            },
                        )
                    })
                    .collect(),
            )),
        }
    }

    fn on_secondary_action(&mut self, key: &str) -> Result<Vec<MenuEntry>, ActionError> {
        let task = self.task(key)?;
        let mut entries = Vec::new();

        for window in &task.windows {
            let label = menu_label(window);
            entries.push(MenuEntry::new(
                format!("{}: Close", label),
                IpcCommand::CloseWindow {
                    address: window.address.clone(),
                },
            ));
            for workspace in 1..=self.config.dock.num_workspaces {
                entries.push(MenuEntry::new(
                    format!("{}: To WS {}", label, workspace),
                    IpcCommand::MoveToWorkspace {
                        address: window.address.clone(),
                        workspace,
                    },
                ));
            }
        }

        entries.push(MenuEntry::new(
            "New window",
            IpcCommand::Launch {
                key: task.key.clone(),
            },
        ));
        if self.pins.contains(&task.key) {
            entries.push(MenuEntry::new(
                "Unpin",
                IpcCommand::Unpin {
                    key: task.key.clone(),
                },
            ));
        } else {
            entries.push(MenuEntry::new(
                "Pin",
                IpcCommand::Pin {
                    key: task.key.clone(),
                },
            ));
        }
        Ok(entries)
    }

    fn on_pin(&mut self, key: &str) -> Result<(), ActionError> {
        self.pins.pin(key)?;
        self.rebuild();
        Ok(())
    }

    fn on_unpin(&mut self, key: &str) -> Result<(), ActionError> {
        self.pins.unpin(key)?;
        self.rebuild();
        Ok(())
    }
}

/// `title (workspace)`, with the title cut to 20 characters.
fn menu_label(window: &Window) -> String {
    let title: String = window.title.chars().take(MENU_TITLE_CHARS).collect();
    format!("{} ({})", title, window.workspace.id)
}

fn summarize(window: &Window) -> WindowSummary {
    WindowSummary {
        address: window.address.clone(),
        class: window.class.clone(),
        title: window.title.clone(),
        workspace: window.workspace.id,
    }
}
