//! HTTP-mocked tests for the GitHub and Azure DevOps publishers.

use mockito::Server;
use pr_review_router::reporter::{OverallStatus, ReportPayload, Reporter, SummaryElement};
use pr_review_router::reporter::github::GithubReporter;

fn payload() -> ReportPayload {
    ReportPayload {
        summary: SummaryElement {
            title: "Review router findings".into(),
            body_markdown: "0 errors, 0 warnings".into(),
            status: OverallStatus::Success,
        },
        inline_comments: vec![],
        drift: None,
    }
}

#[tokio::test]
async fn github_reporter_posts_a_check_run() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/repos/acme/widgets/check-runs")
        .with_status(201)
        .with_body("{}")
        .create_async()
        .await;

    let reporter = GithubReporter::new(
        server.url(),
        "acme/widgets".to_string(),
        "test-token".to_string(),
        1,
        "deadbeef".to_string(),
    );

    reporter.publish(&payload()).await.expect("publish should succeed");
    mock.assert_async().await;
}

#[tokio::test]
async fn github_reporter_retries_on_server_error_then_succeeds() {
    let mut server = Server::new_async().await;
    let fail_mock = server
        .mock("POST", "/repos/acme/widgets/check-runs")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let ok_mock = server
        .mock("POST", "/repos/acme/widgets/check-runs")
        .with_status(201)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let reporter = GithubReporter::new(
        server.url(),
        "acme/widgets".to_string(),
        "test-token".to_string(),
        1,
        "deadbeef".to_string(),
    );

    reporter.publish(&payload()).await.expect("publish should succeed after retry");
    fail_mock.assert_async().await;
    ok_mock.assert_async().await;
}
