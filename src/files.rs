// src/files.rs

//! Tracking of installed-but-unpackaged files reported by the sandbox
//!
//! Each file the build installs without packaging needs a distinct
//! manifest edit, so files are tracked individually. Paths under banned
//! install locations are never recorded; they raise a sticky policy flag
//! that requires human resolution instead.

use std::collections::HashSet;
use tracing::{debug, warn};

/// Install locations a package must never touch
///
/// A path under any of these prefixes is a policy violation, not a
/// missing manifest entry.
pub const BANNED_PREFIXES: &[&str] = &["/opt", "/usr/etc", "/usr/local", "/usr/src", "/var"];

/// Unpackaged-file records discovered in build transcripts
#[derive(Debug, Default)]
pub struct FileManager {
    files: HashSet<String>,
    has_banned: bool,
}

impl FileManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate file path from an unpackaged-files report
    ///
    /// Returns whether the path was accepted as a new record. Banned
    /// paths set the policy flag and are never stored; duplicates are
    /// ignored. Only accepted-new paths should count toward the restart
    /// signal.
    pub fn push_file(&mut self, path: &str) -> bool {
        if BANNED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            warn!("Banned install location: {}", path);
            self.has_banned = true;
            return false;
        }

        let added = self.files.insert(path.to_string());
        if added {
            debug!("Unpackaged file: {}", path);
        }
        added
    }

    /// The accepted file set
    pub fn files(&self) -> &HashSet<String> {
        &self.files
    }

    /// Whether any banned install location was seen
    pub fn has_banned(&self) -> bool {
        self.has_banned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_file_accepts_new_paths() {
        let mut fm = FileManager::new();
        assert!(fm.push_file("/usr/testdir/file"));
        assert!(fm.push_file("/usr/testdir/file1"));
        assert_eq!(fm.files().len(), 2);
        assert!(!fm.has_banned());
    }

    #[test]
    fn test_push_file_duplicate_is_not_new() {
        let mut fm = FileManager::new();
        assert!(fm.push_file("/usr/bin/tool"));
        assert!(!fm.push_file("/usr/bin/tool"));
        assert_eq!(fm.files().len(), 1);
    }

    #[test]
    fn test_push_file_banned_prefixes() {
        let mut fm = FileManager::new();
        for path in [
            "/opt/file",
            "/usr/etc/file",
            "/usr/local/file",
            "/usr/src/file",
            "/var/file",
        ] {
            assert!(!fm.push_file(path));
        }
        assert!(fm.has_banned());
        assert!(fm.files().is_empty());
    }

    #[test]
    fn test_banned_flag_is_sticky() {
        let mut fm = FileManager::new();
        fm.push_file("/var/lib/thing");
        assert!(fm.has_banned());
        assert!(fm.push_file("/usr/share/thing"));
        assert!(fm.has_banned());
    }

    #[test]
    fn test_usr_share_is_not_banned() {
        // /usr/src is banned, /usr/share is not - prefixes must not
        // overmatch
        let mut fm = FileManager::new();
        assert!(fm.push_file("/usr/share/man/man1/tool.1"));
        assert!(!fm.has_banned());
    }
}
