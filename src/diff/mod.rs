//! Diff ingestion and line-addressability layer.
//!
//! `DiffStore` extracts a normalized `ChangeSet` from git between two refs,
//! a staged-only snapshot, or an uncommitted working tree. It is the ONLY
//! producer of canonical paths; every downstream stage consumes the
//! `ChangedFile` list built here.

pub mod refs;
pub mod store;

use serde::{Deserialize, Serialize};

/// Fixed unified-context used for every diff this tool extracts.
pub const UNIFIED_CONTEXT_LINES: u32 = 3;

/// Hard guard: no single run inspects more than this many changed files.
pub const MAX_FILES: usize = 5000;

/// Hard guard: no single run processes more than this many bytes of diff output.
pub const MAX_DIFF_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub path: String,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub additions: u32,
    pub deletions: u32,
    pub patch: Option<String>,
    pub is_binary: bool,
}

impl ChangedFile {
    /// Deleted files never produce inline comments.
    pub fn can_comment(&self) -> bool {
        !self.is_binary && self.status != FileStatus::Deleted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSetSource {
    Range,
    Staged,
    WorkingTree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub base_ref: String,
    pub head_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    /// The original head SHA before merge-commit second-parent substitution,
    /// used as the "check SHA" for host check-runs.
    pub check_sha: String,
    pub files: Vec<ChangedFile>,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub unified_context_lines: u32,
    pub source: ChangeSetSource,
}

impl ChangeSet {
    pub fn file(&self, path: &str) -> Option<&ChangedFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Strip `a/`, `b/`, `./`, and leading `/` prefixes. Idempotent:
/// `canonicalize_path(canonicalize_path(p)) == canonicalize_path(p)`.
pub fn canonicalize_path(path: &str) -> String {
    let mut p = path;
    loop {
        if let Some(rest) = p.strip_prefix("a/") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix("b/") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_known_prefixes() {
        assert_eq!(canonicalize_path("a/src/main.rs"), "src/main.rs");
        assert_eq!(canonicalize_path("b/src/main.rs"), "src/main.rs");
        assert_eq!(canonicalize_path("./src/main.rs"), "src/main.rs");
        assert_eq!(canonicalize_path("/src/main.rs"), "src/main.rs");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for p in ["a/foo.rs", "b/bar/baz.rs", "./qux.rs", "plain.rs", "/abs/path.rs"] {
            let once = canonicalize_path(p);
            let twice = canonicalize_path(&once);
            assert_eq!(once, twice);
            assert!(!twice.starts_with("a/"));
            assert!(!twice.starts_with("b/"));
            assert!(!twice.starts_with("./"));
            assert!(!twice.starts_with('/'));
        }
    }
}
