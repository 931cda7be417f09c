//! `Budget`: the shared resource cap across a single run.
//! State transitions are monotonic — `ok → warning → exceeded → terminated`
//! and never reversed (P-style invariant carried in the data model table).

use std::time::Instant;
use tracing::warn;

/// Path prefixes analyzed first once the budget enters degraded mode.
const HIGH_PRIORITY_PREFIXES: &[&str] = &["auth", "security", "api"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BudgetStatus {
    Ok,
    Warning,
    Exceeded,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct BudgetLimits {
    pub max_files: usize,
    pub max_changed_lines: u64,
    pub max_tokens: u64,
    pub max_usd: f64,
    pub max_wall_ms: u64,
    pub max_call_depth: u32,
    pub max_nodes_visited: u64,
    pub max_pattern_regex_ms: u64,
    /// Percentage thresholds (ascending) at which a warning is logged once.
    pub warn_at_percentages: Vec<u8>,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_files: 500,
            max_changed_lines: 20_000,
            max_tokens: 200_000,
            max_usd: 5.0,
            max_wall_ms: 10 * 60 * 1000,
            max_call_depth: 24,
            max_nodes_visited: 200_000,
            max_pattern_regex_ms: 250,
            warn_at_percentages: vec![75, 90],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetUsage {
    pub files_analyzed: usize,
    pub changed_lines: u64,
    pub estimated_tokens: u64,
    pub estimated_usd: f64,
    pub nodes_visited: u64,
}

pub struct Budget {
    limits: BudgetLimits,
    usage: BudgetUsage,
    status: BudgetStatus,
    started_at: Instant,
    warned_percentages: Vec<u8>,
}

impl Budget {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            usage: BudgetUsage::default(),
            status: BudgetStatus::Ok,
            started_at: Instant::now(),
            warned_percentages: Vec::new(),
        }
    }

    pub fn status(&self) -> BudgetStatus {
        self.status
    }

    pub fn usage(&self) -> &BudgetUsage {
        &self.usage
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Never lowers status — only escalates along the fixed ordering.
    fn escalate(&mut self, new_status: BudgetStatus) {
        if new_status > self.status {
            self.status = new_status;
        }
    }

    /// Checks wall-clock and size caps, escalating status as thresholds are
    /// crossed. Returns `false` once the run should stop issuing new work.
    pub fn should_continue(&mut self) -> bool {
        let elapsed = self.elapsed_ms();
        let wall_pct = percent_of(elapsed, self.limits.max_wall_ms);
        let lines_pct = percent_of(self.usage.changed_lines, self.limits.max_changed_lines);
        let tokens_pct = percent_of(self.usage.estimated_tokens, self.limits.max_tokens);
        let usd_pct = if self.limits.max_usd > 0.0 {
            ((self.usage.estimated_usd / self.limits.max_usd) * 100.0) as u64
        } else {
            0
        };
        let worst_pct = [wall_pct, lines_pct, tokens_pct, usd_pct]
            .into_iter()
            .max()
            .unwrap_or(0);

        self.maybe_warn(worst_pct);

        if elapsed >= self.limits.max_wall_ms {
            self.escalate(BudgetStatus::Terminated);
        } else if worst_pct >= 100 {
            self.escalate(BudgetStatus::Exceeded);
        } else if worst_pct >= 75 {
            self.escalate(BudgetStatus::Warning);
        }

        self.status < BudgetStatus::Terminated
    }

    fn maybe_warn(&mut self, worst_pct: u64) {
        for &threshold in &self.limits.warn_at_percentages.clone() {
            if worst_pct >= threshold as u64 && !self.warned_percentages.contains(&threshold) {
                self.warned_percentages.push(threshold);
                warn!(percent = threshold, "budget usage crossed threshold");
            }
        }
    }

    /// Priority-aware gate: in degraded mode (warning or worse), only
    /// high-priority path prefixes continue to be analyzed.
    pub fn should_analyze_file(&self, path: &str) -> bool {
        if self.usage.files_analyzed >= self.limits.max_files {
            return false;
        }
        if self.status >= BudgetStatus::Warning {
            return HIGH_PRIORITY_PREFIXES
                .iter()
                .any(|prefix| path.starts_with(prefix) || path.contains(&format!("/{prefix}")));
        }
        true
    }

    pub fn record_file(&mut self, line_count: u64) {
        self.usage.files_analyzed += 1;
        self.usage.changed_lines += line_count;
    }

    pub fn record_nodes_visited(&mut self, n: u64) {
        self.usage.nodes_visited += n;
    }

    /// `estimatedTokens ≈ diffBytes / 4`; USD adds a 20%-of-input output-token
    /// estimate on top of the input-token cost.
    pub fn record_llm_cost(&mut self, diff_bytes: u64, input_rate_per_1k: f64, output_rate_per_1k: f64) {
        let input_tokens = diff_bytes / 4;
        let output_tokens = (input_tokens as f64 * 0.20) as u64;
        self.usage.estimated_tokens += input_tokens + output_tokens;
        self.usage.estimated_usd +=
            (input_tokens as f64 / 1000.0) * input_rate_per_1k + (output_tokens as f64 / 1000.0) * output_rate_per_1k;
    }

    pub fn add_log(&self, level: tracing::Level, msg: &str) {
        match level {
            tracing::Level::ERROR => tracing::error!("{msg}"),
            tracing::Level::WARN => tracing::warn!("{msg}"),
            tracing::Level::INFO => tracing::info!("{msg}"),
            tracing::Level::DEBUG => tracing::debug!("{msg}"),
            tracing::Level::TRACE => tracing::trace!("{msg}"),
        }
    }

    pub fn limits(&self) -> &BudgetLimits {
        &self.limits
    }
}

fn percent_of(used: u64, max: u64) -> u64 {
    if max == 0 {
        0
    } else {
        (used * 100) / max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_never_regresses() {
        let mut budget = Budget::new(BudgetLimits {
            max_changed_lines: 100,
            ..BudgetLimits::default()
        });
        budget.record_file(90);
        assert!(budget.should_continue());
        assert_eq!(budget.status(), BudgetStatus::Warning);
        budget.record_file(20);
        assert!(!budget.should_continue());
        assert_eq!(budget.status(), BudgetStatus::Exceeded);
        // a subsequent light recording must not lower the status
        let usage_before = budget.usage().changed_lines;
        assert!(usage_before > 0);
        assert_eq!(budget.status(), BudgetStatus::Exceeded);
    }

    #[test]
    fn degraded_mode_prioritizes_security_paths() {
        let mut budget = Budget::new(BudgetLimits {
            max_changed_lines: 10,
            ..BudgetLimits::default()
        });
        budget.record_file(11);
        budget.should_continue();
        assert!(budget.should_analyze_file("src/auth/login.rs"));
        assert!(!budget.should_analyze_file("src/ui/button.rs"));
    }

    #[test]
    fn file_cap_is_enforced() {
        let mut budget = Budget::new(BudgetLimits {
            max_files: 1,
            ..BudgetLimits::default()
        });
        budget.record_file(1);
        assert!(!budget.should_analyze_file("any/file.rs"));
    }
}
