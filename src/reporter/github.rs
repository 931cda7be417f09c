//! GitHub publisher: posts the check-run summary and inline review comments
//! via the REST API over `reqwest`, with a rate-limit-aware retry loop using
//! exponential backoff (a CI-embedded router needs a headless token story,
//! not an interactive `gh` session).

use crate::error::{Result, RouterError};
use crate::reporter::{extract_markers, OverallStatus, ReportPayload, Reporter, INLINE_COMMENT_RATE_LIMIT};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub struct GithubReporter {
    client: Client,
    api_base_url: String,
    repository: String,
    token: String,
    pr_number: u64,
    check_sha: String,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl GithubReporter {
    pub fn new(api_base_url: String, repository: String, token: String, pr_number: u64, check_sha: String) -> Self {
        Self {
            client: Client::new(),
            api_base_url,
            repository,
            token,
            pr_number,
            check_sha,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1));
        delay.min(self.max_delay)
    }

    async fn request_with_retry(
        &self,
        method: reqwest::Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/repos/{}{path}", self.api_base_url, self.repository);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                return Ok(response);
            }

            let status = response.status();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                return Err(RouterError::generic(format!(
                    "github api request failed: {status}"
                )));
            }
            let delay = self.backoff_delay(attempt);
            warn!(%status, attempt, delay_s = delay.as_secs(), "retrying github api request");
            sleep(delay).await;
        }
    }

    /// Fetches every existing review comment on the PR as `(id, body)`
    /// pairs, used for dedup and stale-comment resolution.
    async fn fetch_existing_comments(&self) -> Result<Vec<(u64, String)>> {
        let response = self
            .request_with_retry(
                reqwest::Method::GET,
                &format!("/pulls/{}/comments", self.pr_number),
                serde_json::Value::Null,
            )
            .await?;
        let body: Vec<serde_json::Value> = response.json().await?;
        Ok(body
            .into_iter()
            .filter_map(|v| {
                let id = v.get("id")?.as_u64()?;
                let body = v.get("body")?.as_str()?.to_string();
                Some((id, body))
            })
            .collect())
    }

    async fn delete_comment(&self, comment_id: u64) -> Result<()> {
        self.request_with_retry(
            reqwest::Method::DELETE,
            &format!("/pulls/comments/{comment_id}"),
            serde_json::Value::Null,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for GithubReporter {
    async fn start_status(&self) -> Result<()> {
        self.request_with_retry(
            reqwest::Method::POST,
            "/check-runs",
            serde_json::json!({
                "name": "pr-review-router",
                "head_sha": self.check_sha,
                "status": "in_progress",
            }),
        )
        .await?;
        Ok(())
    }

    async fn publish(&self, payload: &ReportPayload) -> Result<()> {
        let conclusion = match payload.summary.status {
            OverallStatus::Success => "success",
            OverallStatus::Neutral => "neutral",
            OverallStatus::Failure => "failure",
        };

        self.request_with_retry(
            reqwest::Method::POST,
            "/check-runs",
            serde_json::json!({
                "name": "pr-review-router",
                "head_sha": self.check_sha,
                "status": "completed",
                "conclusion": conclusion,
                "output": {
                    "title": payload.summary.title,
                    "summary": payload.summary.body_markdown,
                }
            }),
        )
        .await?;

        let existing = self.fetch_existing_comments().await?;
        let posted_markers: HashSet<String> = existing
            .iter()
            .flat_map(|(_, body)| extract_markers(body))
            .collect();
        let current_markers: HashSet<String> = payload
            .inline_comments
            .iter()
            .flat_map(|c| c.markers.iter().cloned())
            .collect();

        for comment in &payload.inline_comments {
            if comment.markers.iter().all(|m| posted_markers.contains(m)) {
                continue;
            }
            sleep(INLINE_COMMENT_RATE_LIMIT).await;
            self.request_with_retry(
                reqwest::Method::POST,
                &format!("/pulls/{}/comments", self.pr_number),
                serde_json::json!({
                    "body": comment.body_markdown,
                    "commit_id": self.check_sha,
                    "path": comment.file,
                    "line": comment.line,
                }),
            )
            .await?;
        }

        for (id, body) in &existing {
            let is_stale = extract_markers(body)
                .iter()
                .any(|m| !current_markers.contains(m));
            if is_stale {
                sleep(INLINE_COMMENT_RATE_LIMIT).await;
                self.delete_comment(*id).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_doubles_and_caps() {
        let reporter = GithubReporter::new(
            "https://api.github.com".into(),
            "acme/widgets".into(),
            "token".into(),
            1,
            "sha".into(),
        );
        assert_eq!(reporter.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(reporter.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(reporter.backoff_delay(3), Duration::from_secs(4));
        assert_eq!(reporter.backoff_delay(10), reporter.max_delay);
    }
}
