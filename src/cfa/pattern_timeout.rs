//! Timeout-protected regex evaluation.
//!
//! `regex`'s matcher has no built-in deadline, so a long-running pattern
//! (ReDoS-class or merely pathological) is run on a detached watchdog
//! thread: the caller waits up to the deadline on a channel and treats a
//! timeout as a deterministic non-match.

use regex::Regex;
use std::sync::mpsc;
use std::time::Duration;

pub const DEFAULT_PATTERN_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NotMatched,
    TimedOut,
}

/// Evaluates `regex.is_match(haystack)` with a wall-clock deadline. The
/// worker thread is detached on timeout (it cannot be killed from Rust) but
/// its result is simply discarded — the channel's sender is dropped with it.
pub fn match_with_deadline(regex: &Regex, haystack: &str, timeout_ms: u64) -> MatchOutcome {
    let (tx, rx) = mpsc::channel();
    let regex = regex.clone();
    let haystack = haystack.to_string();
    std::thread::spawn(move || {
        let matched = regex.is_match(&haystack);
        let _ = tx.send(matched);
    });

    match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
        Ok(true) => MatchOutcome::Matched,
        Ok(false) => MatchOutcome::NotMatched,
        Err(_) => MatchOutcome::TimedOut,
    }
}

/// ReDoS risk heuristic: flags nested quantifiers, overlapping
/// alternation, and excessive star-height. Returns a score 0-100.
pub fn redos_risk_score(pattern: &str) -> u8 {
    let mut score: u32 = 0;

    if has_nested_quantifiers(pattern) {
        score += 50;
    }
    let star_height = max_star_height(pattern);
    if star_height >= 2 {
        score += 20 * (star_height as u32 - 1);
    }
    if pattern.contains(")+") || pattern.contains(")*") {
        score += 10;
    }
    if pattern.matches('|').count() >= 3 {
        score += 10;
    }

    score.min(100) as u8
}

fn has_nested_quantifiers(pattern: &str) -> bool {
    let quantifiers = ['*', '+'];
    let chars: Vec<char> = pattern.chars().collect();
    let mut depth_with_quant: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '(' => depth_with_quant.push(false),
            ')' => {
                let had_inner_quant = depth_with_quant.pop().unwrap_or(false);
                if had_inner_quant {
                    if let Some(next) = chars.get(i + 1) {
                        if quantifiers.contains(next) {
                            return true;
                        }
                    }
                }
            }
            c if quantifiers.contains(&c) => {
                if let Some(last) = depth_with_quant.last_mut() {
                    *last = true;
                }
            }
            _ => {}
        }
        i += 1;
    }
    false
}

fn max_star_height(pattern: &str) -> u32 {
    let mut height = 0u32;
    let mut max_height = 0u32;
    for c in pattern.chars() {
        match c {
            '(' => {}
            ')' => height = height.saturating_sub(1),
            '*' | '+' => {
                height += 1;
                max_height = max_height.max(height);
            }
            _ => {}
        }
    }
    max_height
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_pattern_matches_within_deadline() {
        let re = Regex::new(r"^sanitize\(").unwrap();
        assert_eq!(
            match_with_deadline(&re, "sanitize(x)", 100),
            MatchOutcome::Matched
        );
    }

    #[test]
    fn nested_quantifier_pattern_is_flagged_high_risk() {
        let score = redos_risk_score(r"(a+)+$");
        assert!(score >= 50);
    }

    #[test]
    fn benign_pattern_is_low_risk() {
        let score = redos_risk_score(r"^sanitize\(\w+\)$");
        assert!(score < 50);
    }
}
