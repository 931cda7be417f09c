//! `FindingPipeline`: sanitizes, deduplicates, sorts, and groups
//! findings before they reach a `Reporter`.

use crate::types::{Finding, MAX_MESSAGE_LEN, MAX_RULE_ID_LEN, MAX_SUGGESTION_LEN};

pub const LINE_PROXIMITY_THRESHOLD: u32 = 3;

/// Strips null bytes, truncates to the field caps, and HTML-escapes the
/// three ambiguous characters (`<`, `>`, `&`).
pub fn sanitize(finding: &Finding) -> Finding {
    let mut f = finding.clone();
    f.message = truncate(&html_escape(&strip_nulls(&f.message)), MAX_MESSAGE_LEN);
    f.suggestion = f
        .suggestion
        .as_ref()
        .map(|s| truncate(&html_escape(&strip_nulls(s)), MAX_SUGGESTION_LEN));
    f.rule_id = truncate(&strip_nulls(&f.rule_id), MAX_RULE_ID_LEN);
    f
}

fn strip_nulls(s: &str) -> String {
    s.chars().filter(|&c| c != '\0').collect()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Two findings with the same fingerprint and file, within `threshold`
/// lines of each other, collapse to one.
pub fn deduplicate(findings: Vec<Finding>, threshold: u32) -> Vec<Finding> {
    let mut kept: Vec<Finding> = Vec::new();
    'outer: for finding in findings {
        for existing in &kept {
            if existing.fingerprint == finding.fingerprint && existing.file == finding.file {
                let (Some(a), Some(b)) = (existing.line, finding.line) else {
                    continue;
                };
                if a.abs_diff(b) <= threshold {
                    continue 'outer;
                }
            }
        }
        kept.push(finding);
    }
    kept
}

/// Severity error > warning > info, then file, then line.
pub fn sort(mut findings: Vec<Finding>) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
    });
    findings
}

#[derive(Debug, Clone)]
pub struct FindingGroup {
    pub file: String,
    pub findings: Vec<Finding>,
}

/// Adjacent same-file findings within `threshold` lines are grouped into
/// a single inline-comment unit.
pub fn group_adjacent(findings: &[Finding], threshold: u32) -> Vec<FindingGroup> {
    let mut groups: Vec<FindingGroup> = Vec::new();
    for finding in findings {
        if let Some(last) = groups.last_mut() {
            if last.file == finding.file {
                if let (Some(prev_line), Some(cur_line)) =
                    (last.findings.last().and_then(|f| f.line), finding.line)
                {
                    if prev_line.abs_diff(cur_line) <= threshold {
                        last.findings.push(finding.clone());
                        continue;
                    }
                }
            }
        }
        groups.push(FindingGroup {
            file: finding.file.clone(),
            findings: vec![finding.clone()],
        });
    }
    groups
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub complete: Vec<Finding>,
    pub partial: Vec<Finding>,
}

/// Runs the full pipeline over already-stream-separated complete/partial
/// finding lists, leaving the streams separate end to end (partial never
/// gates). `line_proximity_threshold` overrides the default dedup/grouping
/// distance when configured.
pub fn run_pipeline(
    complete: Vec<Finding>,
    partial: Vec<Finding>,
    line_proximity_threshold: Option<u32>,
) -> PipelineOutput {
    let threshold = line_proximity_threshold.unwrap_or(LINE_PROXIMITY_THRESHOLD);
    let complete: Vec<Finding> = complete.iter().map(sanitize).collect();
    let partial: Vec<Finding> = partial.iter().map(sanitize).collect();
    PipelineOutput {
        complete: sort(deduplicate(complete, threshold)),
        partial: sort(deduplicate(partial, threshold)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    fn finding(severity: Severity, file: &str, line: u32, fp: &str) -> Finding {
        Finding::new(severity, file, Some(line), "msg", "rule", "agent", fp)
    }

    #[test]
    fn dedup_collapses_proximate_same_fingerprint_findings() {
        let findings = vec![
            finding(Severity::Warning, "f.rs", 10, "fp1"),
            finding(Severity::Warning, "f.rs", 12, "fp1"),
            finding(Severity::Warning, "f.rs", 50, "fp1"),
        ];
        let deduped = deduplicate(findings, LINE_PROXIMITY_THRESHOLD);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn sort_orders_by_severity_then_file_then_line() {
        let findings = vec![
            finding(Severity::Info, "a.rs", 1, "fp1"),
            finding(Severity::Error, "b.rs", 1, "fp2"),
            finding(Severity::Warning, "a.rs", 1, "fp3"),
        ];
        let sorted = sort(findings);
        assert_eq!(sorted[0].severity, Severity::Error);
        assert_eq!(sorted[2].severity, Severity::Info);
    }

    #[test]
    fn sanitize_strips_nulls_and_escapes_html() {
        let f = finding(Severity::Warning, "f.rs", 1, "fp1");
        let mut f = f;
        f.message = "a\0b <script>".to_string();
        let sanitized = sanitize(&f);
        assert!(!sanitized.message.contains('\0'));
        assert!(sanitized.message.contains("&lt;script&gt;"));
    }

    #[test]
    fn group_adjacent_merges_nearby_findings_in_same_file() {
        let findings = vec![
            finding(Severity::Warning, "f.rs", 10, "fp1"),
            finding(Severity::Warning, "f.rs", 11, "fp2"),
            finding(Severity::Warning, "f.rs", 90, "fp3"),
        ];
        let groups = group_adjacent(&findings, LINE_PROXIMITY_THRESHOLD);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].findings.len(), 2);
    }
}
