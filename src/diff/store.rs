//! `DiffStore`: produces a `ChangeSet` from a base..head pair, a staged-only
//! snapshot, or an uncommitted working-tree diff. All subprocess
//! invocations are shell-free (`Command::new("git").args([...])`), mirroring
//! `utils/git.rs`.

use crate::diff::refs::{parse_range, validate_path, validate_ref};
use crate::diff::{
    canonicalize_path, ChangeSet, ChangeSetSource, ChangedFile, FileStatus, MAX_DIFF_BYTES,
    MAX_FILES, UNIFIED_CONTEXT_LINES,
};
use crate::error::{Result, RouterError, ValidationErrorCode};
use std::path::Path;
use std::process::Command;

/// Local diff source selection for `getLocalDiff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDiffMode {
    /// `git diff --cached` — staged-only snapshot.
    Staged,
    /// `git diff` against the working tree.
    WorkingTree,
}

pub struct DiffStore<'a> {
    repo_path: &'a Path,
}

impl<'a> DiffStore<'a> {
    pub fn new(repo_path: &'a Path) -> Self {
        Self { repo_path }
    }

    fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("git")
            .arg("-C")
            .arg(self.repo_path)
            .args(args)
            .output()
            .map_err(|e| RouterError::git(format!("failed to spawn git {args:?}: {e}")))?;
        if output.stdout.len() as u64 > MAX_DIFF_BYTES {
            return Err(RouterError::validation(
                ValidationErrorCode::DiffTooLarge,
                format!("git output exceeded {MAX_DIFF_BYTES} bytes"),
                args.join(" "),
            ));
        }
        Ok(output)
    }

    /// Resolve `baseRef`/`headRef` to SHAs, accepting branch names, short
    /// refs, `refs/heads/foo` (falling back to `origin/foo`), and detecting
    /// merge-commit heads whose first parent equals base.
    pub fn resolve_refs(&self, base_ref: &str, head_ref: &str) -> Result<(String, String, String)> {
        validate_ref(base_ref)?;
        validate_ref(head_ref)?;

        let base_sha = self.resolve_single_ref(base_ref)?;
        let mut head_sha = self.resolve_single_ref(head_ref)?;
        let check_sha = head_sha.clone();

        if let Ok(parents) = self.commit_parents(&head_sha) {
            if parents.len() >= 2 && parents[0] == base_sha {
                head_sha = parents[1].clone();
            }
        }

        Ok((base_sha, head_sha, check_sha))
    }

    fn resolve_single_ref(&self, candidate: &str) -> Result<String> {
        for attempt in [candidate.to_string(), format!("origin/{candidate}")] {
            let output = self.git(&["rev-parse", "--verify", &attempt])?;
            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }
        Err(RouterError::validation(
            ValidationErrorCode::InvalidGitRef,
            "ref could not be resolved to a commit",
            candidate,
        ))
    }

    fn commit_parents(&self, sha: &str) -> Result<Vec<String>> {
        let output = self.git(&["rev-parse", &format!("{sha}^@")])?;
        if !output.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect())
    }

    /// `parseRange(spec)` followed by ref resolution and diff extraction.
    pub fn get_diff_from_spec(&self, spec: &str) -> Result<ChangeSet> {
        let range = parse_range(spec)?;
        self.get_diff(&range.base, &range.head)
    }

    pub fn get_diff(&self, base: &str, head: &str) -> Result<ChangeSet> {
        let (base_sha, head_sha, check_sha) = self.resolve_refs(base, head)?;
        let spec = format!("{base_sha}..{head_sha}");
        let files = self.collect_changed_files(&spec)?;
        self.build_change_set(base, head, base_sha, head_sha, check_sha, files, ChangeSetSource::Range)
    }

    pub fn get_local_diff(&self, mode: LocalDiffMode, base_ref: &str) -> Result<ChangeSet> {
        validate_ref(base_ref)?;
        let base_sha = self.resolve_single_ref(base_ref)?;
        let source = match mode {
            LocalDiffMode::Staged => ChangeSetSource::Staged,
            LocalDiffMode::WorkingTree => ChangeSetSource::WorkingTree,
        };
        let files = match mode {
            LocalDiffMode::Staged => self.collect_changed_files_with_extra(&[], &["--cached"])?,
            LocalDiffMode::WorkingTree => self.collect_changed_files_with_extra(&[], &[])?,
        };
        self.build_change_set(
            base_ref,
            "HEAD",
            base_sha.clone(),
            base_sha.clone(),
            base_sha,
            files,
            source,
        )
    }

    fn collect_changed_files(&self, spec: &str) -> Result<Vec<ChangedFile>> {
        self.collect_changed_files_with_extra(&[spec], &[])
    }

    /// Parses `git diff --numstat -z` (NUL-delimited, robust against
    /// pathological filenames) then fetches per-file patches.
    fn collect_changed_files_with_extra(
        &self,
        spec_args: &[&str],
        extra: &[&str],
    ) -> Result<Vec<ChangedFile>> {
        let mut args = vec!["diff", "--numstat", "-z", "--find-renames"];
        args.extend_from_slice(extra);
        args.extend_from_slice(spec_args);
        let output = self.git(&args)?;
        if !output.status.success() {
            return Err(RouterError::git(format!(
                "git diff --numstat failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let mut fields: Vec<&str> = raw.split('\0').filter(|s| !s.is_empty()).collect();
        let mut files = Vec::new();

        let mut idx = 0;
        while idx < fields.len() {
            let record = fields[idx];
            idx += 1;
            let mut parts = record.splitn(3, '\t');
            let additions = parts.next().unwrap_or("0");
            let deletions = parts.next().unwrap_or("0");
            let path_field = parts.next().unwrap_or("");

            let is_binary = additions == "-" && deletions == "-";
            let (status, path, old_path) = if path_field.is_empty() {
                // Rename/copy: numstat emits the path as a following NUL field
                // (old then new) when `-z` is combined with rename detection.
                let old = fields.get(idx).copied().unwrap_or_default().to_string();
                let new = fields.get(idx + 1).copied().unwrap_or_default().to_string();
                idx += 2;
                (FileStatus::Renamed, new, Some(old))
            } else {
                (FileStatus::Modified, path_field.to_string(), None)
            };

            if files.len() >= MAX_FILES {
                return Err(RouterError::validation(
                    ValidationErrorCode::TooManyFiles,
                    format!("diff touches more than {MAX_FILES} files"),
                    path,
                ));
            }

            let canonical = canonicalize_path(&path);
            validate_path(&canonical)?;

            let additions_n: u32 = additions.parse().unwrap_or(0);
            let deletions_n: u32 = deletions.parse().unwrap_or(0);

            let patch = if is_binary {
                None
            } else {
                self.file_patch(spec_args, extra, &path).ok().flatten()
            };

            files.push(ChangedFile {
                path: canonical,
                old_path: old_path.map(|p| canonicalize_path(&p)),
                status,
                additions: additions_n,
                deletions: deletions_n,
                patch,
                is_binary,
            });
        }

        // `git log --numstat` can report a leading empty field; guard for it.
        fields.retain(|f| !f.is_empty());
        Ok(files)
    }

    fn file_patch(
        &self,
        spec_args: &[&str],
        extra: &[&str],
        path: &str,
    ) -> Result<Option<String>> {
        let context = format!("-U{UNIFIED_CONTEXT_LINES}");
        let mut args: Vec<&str> = vec!["diff", &context];
        args.extend_from_slice(extra);
        args.extend_from_slice(spec_args);
        args.push("--");
        args.push(path);
        let output = self.git(&args)?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
    }

    fn build_change_set(
        &self,
        base_ref: &str,
        head_ref: &str,
        base_sha: String,
        head_sha: String,
        check_sha: String,
        files: Vec<ChangedFile>,
        source: ChangeSetSource,
    ) -> Result<ChangeSet> {
        let total_additions = files.iter().map(|f| f.additions as u64).sum();
        let total_deletions = files.iter().map(|f| f.deletions as u64).sum();
        Ok(ChangeSet {
            base_ref: base_ref.to_string(),
            head_ref: head_ref.to_string(),
            base_sha,
            head_sha,
            check_sha,
            files,
            total_additions,
            total_deletions,
            unified_context_lines: UNIFIED_CONTEXT_LINES,
            source,
        })
    }
}
