//! Azure DevOps publisher: posts a PR status and thread comments via the
//! Azure DevOps REST API, sharing `GithubReporter`'s retry discipline.

use crate::error::{Result, RouterError};
use crate::reporter::{extract_markers, OverallStatus, ReportPayload, Reporter, INLINE_COMMENT_RATE_LIMIT};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub struct AdoReporter {
    client: Client,
    organization: String,
    project: String,
    repository_id: String,
    pr_id: u64,
    token: String,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl AdoReporter {
    pub fn new(organization: String, project: String, repository_id: String, pr_id: u64, token: String) -> Self {
        Self {
            client: Client::new(),
            organization,
            project,
            repository_id,
            pr_id,
            token,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay * 2_u32.saturating_pow(attempt.saturating_sub(1));
        delay.min(self.max_delay)
    }

    fn base_url(&self) -> String {
        format!(
            "https://dev.azure.com/{}/{}/_apis/git/repositories/{}/pullRequests/{}",
            self.organization, self.project, self.repository_id, self.pr_id
        )
    }

    async fn request_with_retry(
        &self,
        method: Method,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{path}?api-version=7.1", self.base_url());
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .request(method.clone(), &url)
                .basic_auth("", Some(&self.token))
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                return Ok(response);
            }
            let status = response.status();
            let retryable = status.as_u16() == 429 || status.is_server_error();
            if !retryable || attempt >= self.max_retries {
                return Err(RouterError::generic(format!("ado api request failed: {status}")));
            }
            let delay = self.backoff_delay(attempt);
            warn!(%status, attempt, delay_s = delay.as_secs(), "retrying ado api request");
            sleep(delay).await;
        }
    }

    /// Fetches every existing PR thread as `(id, first-comment content)`,
    /// used for dedup and stale-comment resolution.
    async fn fetch_existing_threads(&self) -> Result<Vec<(u64, String)>> {
        let response = self
            .request_with_retry(Method::GET, "/threads", serde_json::Value::Null)
            .await?;
        let body: serde_json::Value = response.json().await?;
        let threads = body.get("value").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        Ok(threads
            .into_iter()
            .filter_map(|t| {
                let id = t.get("id")?.as_u64()?;
                let content = t.get("comments")?.as_array()?.first()?.get("content")?.as_str()?.to_string();
                Some((id, content))
            })
            .collect())
    }

    /// Marks a thread resolved; its content no longer corresponds to a
    /// current finding.
    async fn close_thread(&self, thread_id: u64) -> Result<()> {
        self.request_with_retry(
            Method::PATCH,
            &format!("/threads/{thread_id}"),
            serde_json::json!({ "status": 4 }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Reporter for AdoReporter {
    async fn start_status(&self) -> Result<()> {
        self.request_with_retry(
            Method::POST,
            "/statuses",
            serde_json::json!({
                "state": "pending",
                "description": "pr-review-router analysis in progress",
                "context": { "name": "pr-review-router", "genre": "continuous-integration" },
            }),
        )
        .await?;
        Ok(())
    }

    async fn publish(&self, payload: &ReportPayload) -> Result<()> {
        let vote = match payload.summary.status {
            OverallStatus::Success => 10,
            OverallStatus::Neutral => 0,
            OverallStatus::Failure => -10,
        };

        self.request_with_retry(
            Method::POST,
            "/reviewers/self",
            serde_json::json!({ "vote": vote }),
        )
        .await?;

        self.request_with_retry(
            Method::POST,
            "/threads",
            serde_json::json!({
                "comments": [{ "content": payload.summary.body_markdown, "commentType": 1 }],
                "status": 1,
            }),
        )
        .await?;

        let existing = self.fetch_existing_threads().await?;
        let posted_markers: HashSet<String> = existing
            .iter()
            .flat_map(|(_, content)| extract_markers(content))
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
                Method::POST,
                "/threads",
                serde_json::json!({
                    "comments": [{ "content": comment.body_markdown, "commentType": 1 }],
                    "threadContext": {
                        "filePath": format!("/{}", comment.file),
                        "rightFileStart": { "line": comment.line, "offset": 1 },
                        "rightFileEnd": { "line": comment.line, "offset": 1 },
                    },
                    "status": 1,
                }),
            )
            .await?;
        }

        for (id, content) in &existing {
            let is_stale = extract_markers(content)
                .iter()
                .any(|m| !current_markers.contains(m));
            if is_stale {
                sleep(INLINE_COMMENT_RATE_LIMIT).await;
                self.close_thread(*id).await?;
            }
        }

        Ok(())
    }
}
