//! Pinned set persistence.
//!
//! The file holds one grouping key per line. Blank lines are skipped and
//! nothing is escaped. Every mutation rewrites the whole file.

use hyprdock_core::{validate_key, TaskError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Ordered, duplicate-free list of pinned keys.
#[derive(Debug, Clone, Default)]
pub struct PinnedSet {
    path: Option<PathBuf>,
    keys: Vec<String>,
}

impl PinnedSet {
    /// An in-memory set that is never persisted.
    pub fn in_memory(keys: Vec<String>) -> Self {
        Self {
            path: None,
            keys: parse(&keys.join("\n")),
        }
    }

    /// Load the set from `path`.
    ///
    /// A missing or unreadable file yields an empty set.
    pub fn load(path: PathBuf) -> Self {
        let keys = match fs::read_to_string(&path) {
            Ok(content) => parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No pinned file at {}", path.display());
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to read pinned file {}: {}", path.display(), e);
                Vec::new()
            }
        };
        info!("Loaded {} pinned item(s)", keys.len());
        Self {
            path: Some(path),
            keys,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, key: &str) -> bool {
        let key = key.trim();
        self.keys.iter().any(|k| k == key)
    }

    /// Append `key` and persist. Returns whether the set changed.
    pub fn pin(&mut self, key: &str) -> Result<bool, TaskError> {
        let key = validate_key(key)?;
        if self.contains(key) {
            return Ok(false);
        }
        self.keys.push(key.to_string());
        info!("Pinned {}", key);
        self.persist();
        Ok(true)
    }

    /// Remove `key` and persist. Returns whether the set changed.
    pub fn unpin(&mut self, key: &str) -> Result<bool, TaskError> {
        let key = validate_key(key)?;
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        if self.keys.len() == before {
            return Ok(false);
        }
        info!("Unpinned {}", key);
        self.persist();
        Ok(true)
    }

    /// Truncate and rewrite the file.
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serialize(&self.keys))
    }

    /// Save, keeping the in-memory change if the write fails.
    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("Failed to save pinned items: {}", e);
        }
    }
}

fn parse(content: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for line in content.lines() {
        let key = line.trim();
        if key.is_empty() || keys.iter().any(|k| k == key) {
            continue;
        }
        keys.push(key.to_string());
    }
    keys
}

fn serialize(keys: &[String]) -> String {
    let mut out = keys.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_and_duplicate_lines() {
        let keys = parse("firefox\n\n  kitty \nfirefox\n\t\nmpv");
        assert_eq!(keys, vec!["firefox", "kitty", "mpv"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = PinnedSet::load(dir.path().join("pinned"));
        assert!(set.keys().is_empty());
    }

    #[test]
    fn test_load_unreadable_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a file.
        let set = PinnedSet::load(dir.path().to_path_buf());
        assert!(set.keys().is_empty());
    }

    #[test]
    fn test_pin_persists_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("pinned");
        let mut set = PinnedSet::load(path.clone());

        assert!(set.pin("firefox").unwrap());
        assert!(set.pin(" kitty ").unwrap());
        assert!(!set.pin("firefox").unwrap());

        assert_eq!(fs::read_to_string(&path).unwrap(), "firefox\nkitty\n");
        let reloaded = PinnedSet::load(path);
        assert_eq!(reloaded.keys(), &["firefox", "kitty"]);
    }

    #[test]
    fn test_unpin_removes_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned");
        fs::write(&path, "foo\nbar\n").unwrap();
        let mut set = PinnedSet::load(path.clone());

        assert!(set.unpin("foo").unwrap());
        assert!(!set.unpin("foo").unwrap());
        assert!(!set.contains("foo"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.lines().any(|l| l == "foo"));
        assert_eq!(content, "bar\n");
    }

    #[test]
    fn test_unpin_last_key_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned");
        let mut set = PinnedSet::load(path.clone());
        set.pin("foo").unwrap();
        set.unpin("foo").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let mut set = PinnedSet::in_memory(Vec::new());
        assert_eq!(set.pin("  "), Err(TaskError::EmptyKey));
        assert!(matches!(set.pin("a\nb"), Err(TaskError::MultilineKey(_))));
        assert!(set.keys().is_empty());
    }

    #[test]
    fn test_in_memory_set_dedupes() {
        let set = PinnedSet::in_memory(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(set.keys(), &["a", "b"]);
        assert!(set.save().is_ok());
        assert!(set.path().is_none());
    }
}
