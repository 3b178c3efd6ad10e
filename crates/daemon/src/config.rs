//! Configuration management for the hyprdock daemon.
//!
//! Configuration is loaded from TOML files in the following locations (in order):
//! 1. The path given with `--config`
//! 2. `$XDG_CONFIG_HOME/hyprdock/config.toml` (via `directories`)
//! 3. `~/.config/hyprdock/config.toml`
//! 4. `./config.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use hyprdock_core::{EngineConfig, LauncherPosition, SnapshotFilter, Window};
use hyprdock_ipc::{DockAlignment, DockPosition};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for hyprdock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dock appearance and launcher.
    pub dock: DockConfig,
    /// Runtime behavior.
    pub behavior: BehaviorConfig,
    /// Windows and workspaces never shown.
    pub filter: FilterConfig,
    /// Per-window rules, first match wins.
    #[serde(default)]
    pub window_rules: Vec<WindowRule>,
}

/// How the dock shows and hides.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Always visible; show/hide requests are ignored.
    #[default]
    Normal,
    /// Starts visible; show/hide/toggle requests apply.
    Resident,
    /// Starts hidden; hides again after the pointer leaves.
    Autohide,
}

/// Dock-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    pub position: DockPosition,
    pub alignment: DockAlignment,

    /// Base icon size in pixels.
    #[serde(default = "default_icon_size")]
    pub icon_size: u32,

    /// Command bound to the launcher button.
    #[serde(default = "default_launcher_command")]
    pub launcher_command: String,

    /// Where the launcher button goes.
    pub launcher_position: LauncherPosition,

    /// Whether to show the launcher button.
    #[serde(default = "default_true")]
    pub show_launcher: bool,

    /// Number of workspaces offered in "move to workspace" menus.
    #[serde(default = "default_num_workspaces")]
    pub num_workspaces: u32,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            position: DockPosition::default(),
            alignment: DockAlignment::default(),
            icon_size: default_icon_size(),
            launcher_command: default_launcher_command(),
            launcher_position: LauncherPosition::default(),
            show_launcher: true,
            num_workspaces: default_num_workspaces(),
        }
    }
}

/// Behavior-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Display mode (normal, resident, autohide).
    pub mode: DisplayMode,

    /// Delay before hiding after the pointer leaves, in autohide mode.
    #[serde(default = "default_hide_delay")]
    pub hide_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between safety-net refreshes; 0 disables them.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Bound on one compositor request/reply round trip.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,

    /// Override for the pinned items file.
    #[serde(default)]
    pub pinned_file: Option<PathBuf>,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            hide_delay_ms: default_hide_delay(),
            log_level: default_log_level(),
            reconcile_interval_secs: default_reconcile_interval(),
            command_timeout_ms: default_command_timeout(),
            pinned_file: None,
        }
    }
}

/// Windows the dock never shows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Workspace ids or names. Names match the part before `:`.
    pub ignore_workspaces: Vec<String>,
    /// Exact classes to hide.
    pub ignore_classes: Vec<String>,
}

// Default value functions for serde
fn default_icon_size() -> u32 {
    48
}

fn default_launcher_command() -> String {
    "nwg-drawer".to_string()
}

fn default_true() -> bool {
    true
}

fn default_num_workspaces() -> u32 {
    10
}

fn default_hide_delay() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconcile_interval() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    1500
}

// ============================================================================
// Window Rules
// ============================================================================

/// A rule deciding whether a window is shown on the dock.
///
/// Window rules are evaluated in order; the first matching rule wins.
///
/// # Example Config
///
/// ```toml
/// [[window_rules]]
/// match_class = "^steam$"
/// match_title = "^Friends List$"
/// action = "ignore"
///
/// [[window_rules]]
/// match_class = "^org\\.gnome\\..*"
/// action = "show"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRule {
    /// Regex pattern to match the window class.
    #[serde(default)]
    pub match_class: Option<String>,

    /// Regex pattern to match the window title.
    #[serde(default)]
    pub match_title: Option<String>,

    /// Action to take when the rule matches.
    #[serde(default)]
    pub action: WindowAction,
}

/// Action to take for a matching window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAction {
    /// Show the window (stops rule evaluation).
    #[default]
    Show,
    /// Leave the window off the dock.
    Ignore,
}

/// A window rule with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledWindowRule {
    class: Option<Regex>,
    title: Option<Regex>,
    action: WindowAction,
}

impl CompiledWindowRule {
    /// Compile a rule. Returns an error message for invalid patterns.
    pub fn compile(rule: &WindowRule) -> Result<Self, String> {
        let compile = |pattern: &Option<String>, field: &str| -> Result<Option<Regex>, String> {
            pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| format!("invalid {} regex: {}", field, e))
        };
        Ok(Self {
            class: compile(&rule.match_class, "match_class")?,
            title: compile(&rule.match_title, "match_title")?,
            action: rule.action,
        })
    }

    /// Check if this rule matches a window with the given properties.
    ///
    /// All specified match criteria must match for the rule to apply.
    /// If no match criteria are specified, the rule matches nothing.
    pub fn matches(&self, class: &str, title: &str) -> bool {
        if self.class.is_none() && self.title.is_none() {
            return false;
        }
        if let Some(ref re) = self.class {
            if !re.is_match(class) {
                return false;
            }
        }
        if let Some(ref re) = self.title {
            if !re.is_match(title) {
                return false;
            }
        }
        true
    }
}

/// Compiled rule list.
#[derive(Debug, Clone, Default)]
pub struct WindowRules {
    rules: Vec<CompiledWindowRule>,
}

impl WindowRules {
    /// Compile every rule, dropping invalid ones with a warning.
    pub fn compile(rules: &[WindowRule]) -> Self {
        let rules = rules
            .iter()
            .enumerate()
            .filter_map(|(idx, rule)| match CompiledWindowRule::compile(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    tracing::warn!("Dropping window rule #{}: {}", idx + 1, e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Action of the first matching rule; windows no rule matches are shown.
    pub fn evaluate(&self, class: &str, title: &str) -> WindowAction {
        self.rules
            .iter()
            .find(|rule| rule.matches(class, title))
            .map(|rule| rule.action)
            .unwrap_or_default()
    }

    /// Check whether a window should be shown.
    pub fn retains(&self, window: &Window) -> bool {
        self.evaluate(&window.class, &window.title) == WindowAction::Show
    }
}

/// A value `validate` had to correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl Config {
    /// Load configuration, from `explicit` if given, else from the standard
    /// locations.
    ///
    /// Returns default config if no file is found.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Self::load_from_path(path);
        }

        for path in config_paths() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Clamp out-of-range values, returning what was changed.
    pub fn validate(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let icon_size = self.dock.icon_size.clamp(16, 256);
        if icon_size != self.dock.icon_size {
            warnings.push(ConfigWarning {
                field: "dock.icon_size",
                message: format!("{} out of range 16..=256, using {}", self.dock.icon_size, icon_size),
            });
            self.dock.icon_size = icon_size;
        }

        let num_workspaces = self.dock.num_workspaces.clamp(1, 30);
        if num_workspaces != self.dock.num_workspaces {
            warnings.push(ConfigWarning {
                field: "dock.num_workspaces",
                message: format!(
                    "{} out of range 1..=30, using {}",
                    self.dock.num_workspaces, num_workspaces
                ),
            });
            self.dock.num_workspaces = num_workspaces;
        }

        let timeout = self.behavior.command_timeout_ms.clamp(100, 10_000);
        if timeout != self.behavior.command_timeout_ms {
            warnings.push(ConfigWarning {
                field: "behavior.command_timeout_ms",
                message: format!(
                    "{} out of range 100..=10000, using {}",
                    self.behavior.command_timeout_ms, timeout
                ),
            });
            self.behavior.command_timeout_ms = timeout;
        }

        if self.dock.show_launcher && self.dock.launcher_command.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "dock.launcher_command",
                message: "empty launcher command, hiding the launcher".to_string(),
            });
            self.dock.show_launcher = false;
        }

        warnings
    }

    /// Settings for the task engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            icon_size: self.dock.icon_size,
            launcher_command: self.dock.launcher_command.clone(),
            show_launcher: self.dock.show_launcher,
            launcher_position: self.dock.launcher_position,
            suppress_active: self.behavior.mode == DisplayMode::Autohide,
            ignored_classes: self.filter.ignore_classes.clone(),
        }
    }

    /// Workspace filter for snapshots.
    pub fn snapshot_filter(&self) -> SnapshotFilter {
        SnapshotFilter::new(&self.filter.ignore_workspaces)
    }

    /// Pinned items file: the configured override, else the cache dir.
    pub fn pinned_file(&self) -> Option<PathBuf> {
        self.behavior
            .pinned_file
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.cache_dir().join("pinned")))
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.behavior.hide_delay_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.behavior.command_timeout_ms)
    }

    /// Safety-net refresh period, `None` when disabled.
    pub fn reconcile_interval(&self) -> Option<Duration> {
        match self.behavior.reconcile_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "hyprdock")
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(proj_dirs) = project_dirs() {
        paths.push(proj_dirs.config_dir().join("config.toml"));
    }

    if let Some(home) = dirs_home() {
        let legacy = home.join(".config").join("hyprdock").join("config.toml");
        if !paths.contains(&legacy) {
            paths.push(legacy);
        }
    }

    paths.push(PathBuf::from("config.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
