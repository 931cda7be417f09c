//! `Reporter` contract: two concrete publishers (GitHub, Azure
//! DevOps) share one trait; platform payload shapes are abstracted to a
//! summary element, an inline-comment element, and an overall-status
//! element.

pub mod ado;
pub mod github;

use crate::error::Result;
use crate::line_resolver::DriftSignal;
use crate::pipeline::FindingGroup;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    Success,
    Neutral,
    Failure,
}

#[derive(Debug, Clone)]
pub struct SummaryElement {
    pub title: String,
    pub body_markdown: String,
    pub status: OverallStatus,
}

#[derive(Debug, Clone)]
pub struct InlineCommentElement {
    pub file: String,
    pub line: u32,
    pub body_markdown: String,
    /// Hidden fingerprint marker(s) embedded for stale-comment resolution.
    pub markers: Vec<String>,
}

pub struct ReportPayload {
    pub summary: SummaryElement,
    pub inline_comments: Vec<InlineCommentElement>,
    pub drift: Option<DriftSignal>,
}

#[async_trait]
pub trait Reporter: Send + Sync {
    /// Opens an in-progress status/check-run immediately, before the
    /// analysis pipeline runs, so the user sees activity right away.
    async fn start_status(&self) -> Result<()>;

    /// Posts the summary + any gating inline comments; resolves stale
    /// fingerprint-marked comments from prior runs that no longer apply.
    async fn publish(&self, payload: &ReportPayload) -> Result<()>;
}

/// Builds the inline-comment element list from grouped findings, one
/// comment body per group, carrying every finding's fingerprint marker.
/// Caps the result at `max_comments` groups (highest severity first, since
/// `groups` is derived from already-severity-sorted findings); any groups
/// dropped past the cap are logged.
pub fn build_inline_comments(groups: &[FindingGroup], max_comments: Option<u32>) -> Vec<InlineCommentElement> {
    let mut comments: Vec<InlineCommentElement> = groups
        .iter()
        .filter_map(|group| {
            let line = group.findings.first()?.line?;
            let mut body = String::new();
            for finding in &group.findings {
                body.push_str(&format!(
                    "{} **{}** {}\n",
                    finding.severity.emoji(),
                    finding.rule_id,
                    finding.message
                ));
                if let Some(suggestion) = &finding.suggestion {
                    body.push_str(&format!("\nSuggestion: {suggestion}\n"));
                }
                body.push_str(&finding.marker());
                body.push('\n');
            }
            Some(InlineCommentElement {
                file: group.file.clone(),
                line,
                body_markdown: body,
                markers: group.findings.iter().map(|f| f.marker()).collect(),
            })
        })
        .collect();

    if let Some(max) = max_comments {
        let max = max as usize;
        if comments.len() > max {
            tracing::warn!(
                dropped = comments.len() - max,
                max_inline_comments = max,
                "inline comment cap reached; dropping lowest-priority groups"
            );
            comments.truncate(max);
        }
    }
    comments
}

/// Minimum spacing between successive inline-comment API calls.
pub const INLINE_COMMENT_RATE_LIMIT: std::time::Duration = std::time::Duration::from_millis(100);

static MARKER_PATTERN: once_cell::sync::Lazy<regex::Regex> =
    once_cell::sync::Lazy::new(|| regex::Regex::new(r"<!-- review-router:fp=\S+ -->").unwrap());

/// Extracts every fingerprint marker embedded in a comment body, for
/// stale-comment detection and dedup matching.
pub fn extract_markers(body: &str) -> Vec<String> {
    MARKER_PATTERN.find_iter(body).map(|m| m.as_str().to_string()).collect()
}
