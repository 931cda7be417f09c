//! `IgnoreMatcher`: a gitignore-compatible pattern list compiled
//! once at load, applied in order with last-match-wins semantics so negation
//! (`!pattern`) works correctly.

use regex::Regex;
use std::path::Path;

pub const MAX_IGNORE_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
struct CompiledPattern {
    regex: Regex,
    negated: bool,
    #[allow(dead_code)]
    line_number: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    /// ignore-file patterns, then config excludes, then config includes —
    /// applied in that order.
    patterns: Vec<CompiledPattern>,
    includes: Vec<CompiledPattern>,
}

impl IgnoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_ignore_file(&mut self, contents: &str) {
        for (idx, line) in contents.lines().enumerate() {
            if let Some(pattern) = parse_ignore_line(line, idx) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn load_excludes(&mut self, patterns: &[String]) {
        for (idx, p) in patterns.iter().enumerate() {
            if let Some(pattern) = parse_ignore_line(p, idx) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn load_includes(&mut self, patterns: &[String]) {
        for (idx, p) in patterns.iter().enumerate() {
            if let Some(pattern) = parse_ignore_line(p, idx) {
                self.includes.push(pattern);
            }
        }
    }

    /// Applies ignore-file + excludes (last-match-wins), then, if any
    /// include patterns are configured, requires an include match too.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.regex.is_match(&path_str) {
                ignored = !pattern.negated;
            }
        }
        if ignored {
            return true;
        }
        if !self.includes.is_empty() {
            let included = self
                .includes
                .iter()
                .any(|p| p.regex.is_match(&path_str) && !p.negated);
            return !included;
        }
        false
    }
}

fn parse_ignore_line(line: &str, line_number: usize) -> Option<CompiledPattern> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('#') {
        return None;
    }

    let (negated, body) = if let Some(rest) = trimmed.strip_prefix('!') {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix("\\!") {
        (false, rest)
    } else if let Some(rest) = trimmed.strip_prefix("\\#") {
        (false, rest)
    } else {
        (false, trimmed)
    };

    let rooted = body.starts_with('/');
    let dir_only = body.ends_with('/');
    let core = body.trim_start_matches('/').trim_end_matches('/');
    if core.is_empty() {
        return None;
    }

    let mut regex_str = String::from("^");
    if !rooted {
        regex_str.push_str("(?:.*/)?");
    }
    regex_str.push_str(&glob_to_regex(core));
    if dir_only {
        regex_str.push_str("(?:/.*)?$");
    } else {
        regex_str.push_str("(?:/.*)?$");
    }

    Regex::new(&regex_str)
        .ok()
        .map(|regex| CompiledPattern {
            regex,
            negated,
            line_number,
        })
}

/// Translates a gitignore glob into a regex body: `**` recursive, `*`
/// single-segment, `?` single char, `[abc]` classes passed through.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '^' | '$' | '|' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '[' => {
                out.push('[');
                for c2 in chars.by_ref() {
                    out.push(c2);
                    if c2 == ']' {
                        break;
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_segment_matches_anywhere() {
        let mut m = IgnoreMatcher::new();
        m.load_ignore_file("node_modules\n");
        assert!(m.is_ignored(Path::new("node_modules/foo.js")));
        assert!(m.is_ignored(Path::new("a/b/node_modules/foo.js")));
        assert!(!m.is_ignored(Path::new("src/main.rs")));
    }

    #[test]
    fn rooted_pattern_only_matches_at_root() {
        let mut m = IgnoreMatcher::new();
        m.load_ignore_file("/build\n");
        assert!(m.is_ignored(Path::new("build/out.o")));
        assert!(!m.is_ignored(Path::new("sub/build/out.o")));
    }

    #[test]
    fn negation_is_last_match_wins() {
        let mut m = IgnoreMatcher::new();
        m.load_ignore_file("*.log\n!important.log\n");
        assert!(m.is_ignored(Path::new("debug.log")));
        assert!(!m.is_ignored(Path::new("important.log")));
    }

    #[test]
    fn comments_and_escapes_are_handled() {
        let mut m = IgnoreMatcher::new();
        m.load_ignore_file("# a comment\n\\#not_a_comment\n");
        assert!(m.is_ignored(Path::new("#not_a_comment")));
    }

    #[test]
    fn includes_act_as_whitelist_when_present() {
        let mut m = IgnoreMatcher::new();
        m.load_includes(&["src/**".to_string()]);
        assert!(!m.is_ignored(Path::new("src/main.rs")));
        assert!(m.is_ignored(Path::new("docs/readme.md")));
    }
}
