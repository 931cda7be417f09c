//! `LineResolver`: parses unified-diff hunks into a `LineMap`
//! and validates whether a finding's line is commentable on the host
//! platform. ALL inline comments are pre-validated here — host APIs
//! silently drop or mis-place comments on off-diff lines.

use crate::diff::ChangeSet;
use crate::types::Finding;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use once_cell::sync::Lazy;

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    Addition,
    Context,
}

#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<(u32, LineTag)>,
}

#[derive(Debug, Clone, Default)]
pub struct FileLineMap {
    pub all_lines: BTreeSet<u32>,
    pub added_lines: BTreeSet<u32>,
    pub context_lines: BTreeSet<u32>,
    pub hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, Default)]
pub struct LineMap {
    pub files: HashMap<String, FileLineMap>,
}

impl LineMap {
    /// `build(files)`: walk each hunk keeping a running new-file line
    /// counter. `+` lines add to all+added; ` ` lines add to all+context;
    /// `-` lines advance only the old-file counter; `\` lines are ignored.
    /// Deleted files are omitted entirely.
    pub fn build(change_set: &ChangeSet) -> Self {
        let mut files = HashMap::new();
        for file in &change_set.files {
            if !file.can_comment() {
                continue;
            }
            let Some(patch) = &file.patch else { continue };
            files.insert(file.path.clone(), parse_patch(patch));
        }
        Self { files }
    }

    pub fn validate(
        &self,
        file: &str,
        line: u32,
        additions_only: bool,
        suggest_nearest: bool,
    ) -> LineValidation {
        let Some(map) = self.files.get(file) else {
            return LineValidation::Invalid {
                reason: "file not present in diff".into(),
                nearest: None,
            };
        };
        let valid_set = if additions_only {
            &map.added_lines
        } else {
            &map.all_lines
        };
        if valid_set.contains(&line) {
            return LineValidation::Valid;
        }
        let nearest = if suggest_nearest {
            nearest_line(line, valid_set)
        } else {
            None
        };
        LineValidation::Invalid {
            reason: "line is not part of the diff context".into(),
            nearest,
        }
    }

    /// `normalizeForDiff`: classify every finding as valid / snapped / dropped.
    pub fn normalize_for_diff(
        &self,
        findings: &[Finding],
        additions_only: bool,
        suggest_nearest: bool,
    ) -> NormalizeStats {
        let mut stats = NormalizeStats::default();
        for f in findings {
            let Some(line) = f.line else {
                stats.dropped += 1;
                continue;
            };
            match self.validate(&f.file, line, additions_only, suggest_nearest) {
                LineValidation::Valid => stats.valid += 1,
                LineValidation::Invalid { nearest: Some(_), .. } => stats.normalized += 1,
                LineValidation::Invalid { nearest: None, .. } => stats.dropped += 1,
            }
        }
        stats
    }

    /// `computeDrift`: degradation signal used by the Reporter's drift gate.
    pub fn compute_drift(&self, stats: &NormalizeStats) -> DriftSignal {
        let total = stats.valid + stats.normalized + stats.dropped;
        let degradation_percent = if total == 0 {
            0.0
        } else {
            (stats.normalized + stats.dropped) as f64 / total as f64 * 100.0
        };
        let severity = if degradation_percent >= 50.0 {
            DriftSeverity::Severe
        } else if degradation_percent >= 20.0 {
            DriftSeverity::Moderate
        } else {
            DriftSeverity::None
        };
        DriftSignal {
            degradation_percent,
            severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineValidation {
    Valid,
    Invalid {
        reason: String,
        nearest: Option<u32>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeStats {
    pub valid: usize,
    pub normalized: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftSeverity {
    None,
    Moderate,
    Severe,
}

#[derive(Debug, Clone)]
pub struct DriftSignal {
    pub degradation_percent: f64,
    pub severity: DriftSeverity,
}

/// `nearest(T, V) = argmin_{v in V} |v - T|`, ties broken by the lowest v.
/// Walks the sorted set and returns early once the search has crossed
/// the target, since distance only grows afterward.
fn nearest_line(target: u32, valid: &BTreeSet<u32>) -> Option<u32> {
    let mut best: Option<(u32, i64)> = None;
    for &v in valid {
        let dist = (v as i64 - target as i64).abs();
        match best {
            None => best = Some((v, dist)),
            Some((_, best_dist)) if dist < best_dist => best = Some((v, dist)),
            _ => {}
        }
        if v > target && best.map(|(_, d)| d).unwrap_or(i64::MAX) <= (v as i64 - target as i64) {
            break;
        }
    }
    best.map(|(v, _)| v)
}

fn parse_patch(patch: &str) -> FileLineMap {
    let mut map = FileLineMap::default();
    let mut new_line = 0u32;
    let mut in_hunk = false;
    let mut current: Option<DiffHunk> = None;

    for raw_line in patch.lines() {
        if let Some(caps) = HUNK_HEADER.captures(raw_line) {
            if let Some(h) = current.take() {
                map.hunks.push(h);
            }
            let old_start: u32 = caps.get(1).map(|m| m.as_str()).unwrap_or("0").parse().unwrap_or(0);
            let old_count: u32 = caps
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or("1")
                .parse()
                .unwrap_or(1);
            let new_start: u32 = caps.get(3).map(|m| m.as_str()).unwrap_or("0").parse().unwrap_or(0);
            let new_count: u32 = caps
                .get(4)
                .map(|m| m.as_str())
                .unwrap_or("1")
                .parse()
                .unwrap_or(1);
            new_line = new_start;
            current = Some(DiffHunk {
                old_start,
                old_count,
                new_start,
                new_count,
                lines: Vec::new(),
            });
            in_hunk = true;
            continue;
        }
        if !in_hunk {
            continue;
        }
        if raw_line.starts_with('\\') {
            continue;
        }
        let Some(hunk) = current.as_mut() else { continue };
        if let Some(rest) = raw_line.strip_prefix('+') {
            let _ = rest;
            map.all_lines.insert(new_line);
            map.added_lines.insert(new_line);
            hunk.lines.push((new_line, LineTag::Addition));
            new_line += 1;
        } else if let Some(rest) = raw_line.strip_prefix('-') {
            let _ = rest;
            // old-file counter only; no new-file line allocated
        } else if raw_line.starts_with(' ') || raw_line.is_empty() {
            map.all_lines.insert(new_line);
            map.context_lines.insert(new_line);
            hunk.lines.push((new_line, LineTag::Context));
            new_line += 1;
        }
    }
    if let Some(h) = current.take() {
        map.hunks.push(h);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{ChangeSetSource, ChangedFile, FileStatus};

    fn sample_change_set(patch: &str) -> ChangeSet {
        ChangeSet {
            base_ref: "main".into(),
            head_ref: "feature".into(),
            base_sha: "a".into(),
            head_sha: "b".into(),
            check_sha: "b".into(),
            files: vec![ChangedFile {
                path: "src/lib.rs".into(),
                old_path: None,
                status: FileStatus::Modified,
                additions: 2,
                deletions: 1,
                patch: Some(patch.to_string()),
                is_binary: false,
            }],
            total_additions: 2,
            total_deletions: 1,
            unified_context_lines: 3,
            source: ChangeSetSource::Range,
        }
    }

    const PATCH: &str = "@@ -1,3 +1,4 @@\n context1\n-removed\n+added1\n+added2\n context2\n";

    #[test]
    fn build_classifies_added_and_context_lines() {
        let cs = sample_change_set(PATCH);
        let map = LineMap::build(&cs);
        let file_map = map.files.get("src/lib.rs").unwrap();
        assert!(file_map.added_lines.is_superset(&file_map.added_lines));
        assert!(file_map.context_lines.is_subset(&file_map.all_lines));
        assert!(file_map.added_lines.is_subset(&file_map.all_lines));
    }

    #[test]
    fn validate_accepts_diff_lines_and_rejects_others() {
        let cs = sample_change_set(PATCH);
        let map = LineMap::build(&cs);
        let file_map = map.files.get("src/lib.rs").unwrap();
        let any_added = *file_map.added_lines.iter().next().unwrap();
        assert_eq!(
            map.validate("src/lib.rs", any_added, false, false),
            LineValidation::Valid
        );
        match map.validate("src/lib.rs", 9999, false, true) {
            LineValidation::Invalid { nearest, .. } => assert!(nearest.is_some()),
            LineValidation::Valid => panic!("expected invalid"),
        }
    }

    #[test]
    fn nearest_line_breaks_ties_toward_lower_value() {
        let mut set = BTreeSet::new();
        set.insert(5);
        set.insert(15);
        // target 10 is equidistant from 5 and 15; lower wins.
        assert_eq!(nearest_line(10, &set), Some(5));
    }
}
