//! Desktop entry lookup and application launching.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Icon name used when no desktop entry names one.
pub const MISSING_ICON: &str = "icon-missing";

/// The parts of a `.desktop` file the dock uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    /// Display name.
    pub name: String,
    /// Icon name or absolute path.
    pub icon: String,
    /// Raw `Exec=` value.
    pub exec: String,
}

impl DesktopEntry {
    /// Entry used when no file is found for `key`.
    pub fn fallback(key: &str) -> Self {
        Self {
            name: key.to_string(),
            icon: MISSING_ICON.to_string(),
            exec: key.to_string(),
        }
    }

    /// Parse the `[Desktop Entry]` group, falling back to `key` for missing fields.
    pub fn parse(key: &str, content: &str) -> Self {
        let mut entry = Self::fallback(key);
        let mut in_main_group = false;
        let (mut name, mut icon, mut exec) = (None, None, None);

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                in_main_group = line == "[Desktop Entry]";
                continue;
            }
            if !in_main_group {
                continue;
            }
            let Some((field, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match field.trim() {
                "Name" if name.is_none() => name = Some(value),
                "Icon" if icon.is_none() => icon = Some(value),
                "Exec" if exec.is_none() => exec = Some(value),
                _ => {}
            }
        }

        if let Some(name) = name.filter(|v| !v.is_empty()) {
            entry.name = name.to_string();
        }
        if let Some(icon) = icon.filter(|v| !v.is_empty()) {
            entry.icon = icon.to_string();
        }
        if let Some(exec) = exec.filter(|v| !v.is_empty()) {
            entry.exec = exec.to_string();
        }
        entry
    }

    /// Command to start a new instance.
    pub fn launch_command(&self) -> Option<LaunchCommand> {
        LaunchCommand::parse(&self.exec)
    }
}

/// A program with arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchCommand {
    /// Parse an `Exec=` value.
    ///
    /// Field codes (`%U`, `%f`, ...) and quotes are stripped; leading
    /// `VAR=value` tokens become environment. `env VAR=value prog` is
    /// handled the same way.
    pub fn parse(exec: &str) -> Option<Self> {
        let cleaned = exec.replace('"', "");
        let mut tokens = cleaned
            .split_whitespace()
            .filter(|t| !is_field_code(t))
            .peekable();

        if tokens.peek() == Some(&"env") {
            tokens.next();
        }

        let mut env = Vec::new();
        while let Some(&token) = tokens.peek() {
            match token.split_once('=') {
                Some((var, value)) if !var.is_empty() && !token.starts_with('-') => {
                    env.push((var.to_string(), value.to_string()));
                    tokens.next();
                }
                _ => break,
            }
        }

        let program = tokens.next()?.to_string();
        let args = tokens.map(str::to_string).collect();
        Some(Self { program, args, env })
    }

    /// Start the program detached from the dock.
    pub fn spawn(&self) -> std::io::Result<()> {
        info!(
            "Launching {} {:?} (env: {:?})",
            self.program, self.args, self.env
        );
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        // The child is reaped in the background once the handle is dropped.
        command.spawn().map(drop)
    }
}

fn is_field_code(token: &str) -> bool {
    token.len() == 2 && token.starts_with('%')
}

/// Application directories in lookup order.
pub fn app_dirs() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let data_home = std::env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let data_dirs = std::env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    build_app_dirs(home.as_deref(), data_home.as_deref(), &data_dirs)
}

fn build_app_dirs(home: Option<&Path>, data_home: Option<&Path>, data_dirs: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match (data_home, home) {
        (Some(data_home), _) => dirs.push(data_home.join("applications")),
        (None, Some(home)) => dirs.push(home.join(".local/share/applications")),
        (None, None) => {}
    }
    for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
        dirs.push(Path::new(dir).join("applications"));
    }
    let mut flatpak = Vec::new();
    if let Some(home) = home {
        flatpak.push(home.join(".local/share/flatpak/exports/share/applications"));
    }
    flatpak.push(PathBuf::from("/var/lib/flatpak/exports/share/applications"));
    for dir in flatpak {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Find the `.desktop` file for `key`.
///
/// Tries `<key>.desktop`, then the lowercase name, in every directory; then
/// scans for reverse-DNS names such as `org.gnome.Nautilus.desktop`.
pub fn find_desktop_file(key: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let exact = format!("{}.desktop", key);
    let lower = exact.to_lowercase();
    for dir in dirs {
        for name in [&exact, &lower] {
            let path = dir.join(name);
            if path.is_file() {
                return Some(path);
            }
        }
    }
    search_desktop_dirs(key, dirs)
}

fn search_desktop_dirs(key: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let before_hyphen = key.split('-').next().unwrap_or(key);
    let suffix = format!("{}.desktop", key);
    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.contains(before_hyphen) && name.matches('.').count() > 1 && name.ends_with(&suffix) {
                return Some(entry.path());
            }
        }
    }
    None
}

/// Desktop entry lookups, cached per key.
#[derive(Debug, Default)]
pub struct DesktopCatalog {
    dirs: Vec<PathBuf>,
    cache: HashMap<String, DesktopEntry>,
}

impl DesktopCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            cache: HashMap::new(),
        }
    }

    /// Catalog over the standard application directories.
    pub fn from_env() -> Self {
        Self::new(app_dirs())
    }

    /// Entry for `key`; lookup failures give the fallback entry.
    pub fn lookup(&mut self, key: &str) -> &DesktopEntry {
        let dirs = &self.dirs;
        self.cache.entry(key.to_string()).or_insert_with(|| {
            let Some(path) = find_desktop_file(key, dirs) else {
                debug!("No desktop entry for {}", key);
                return DesktopEntry::fallback(key);
            };
            match fs::read_to_string(&path) {
                Ok(content) => DesktopEntry::parse(key, &content),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    DesktopEntry::fallback(key)
                }
            }
        })
    }

    /// Forget cached entries (config reload).
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
