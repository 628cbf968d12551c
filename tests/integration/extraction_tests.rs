//! Integration tests for extraction jobs
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! orchestrator (HTTP renderer, CSS matcher, stores) end-to-end.

use page_harvest::config::{parse_config, Config};
use page_harvest::job::StatusView;
use page_harvest::{ExtractionRequest, JobError, JobId, JobOrchestrator, JobStatus};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with in-memory stores and short timeouts
fn create_test_config() -> Config {
    parse_config(
        r#"
        [service]
        max-concurrent-jobs = 4

        [renderer]
        timeout-secs = 10
        "#,
    )
    .expect("test config should be valid")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

/// Mounts a chain of pages /page/1 ..= /page/{count}, each linking to the next
async fn mount_chain(server: &MockServer, count: usize, expected_hits: impl Fn(usize) -> u64) {
    for n in 1..=count {
        let next = if n < count {
            format!(r#"<nav><a href="/page/{}">Next</a></nav>"#, n + 1)
        } else {
            String::new()
        };
        Mock::given(method("GET"))
            .and(path(format!("/page/{}", n)))
            .respond_with(html(&format!("<main>Content of page {}</main>{}", n, next)))
            .expect(expected_hits(n))
            .mount(server)
            .await;
    }
}

async fn wait_for(
    orchestrator: &JobOrchestrator,
    id: JobId,
    done: impl Fn(JobStatus) -> bool,
) -> StatusView {
    for _ in 0..400 {
        let view = orchestrator.get_status(id).expect("job should exist");
        if done(view.status) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not reach the expected status in time", id);
}

async fn wait_terminal(orchestrator: &JobOrchestrator, id: JobId) -> StatusView {
    wait_for(orchestrator, id, |status| status.is_terminal()).await
}

#[tokio::test]
async fn test_single_page_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<header>Site</header><main><h1>Hello</h1></main>"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(ExtractionRequest::new(format!("{}/", server.uri())).with_selector("main"))
        .unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.pages_extracted, 1);

    let result = orchestrator.get_result(id).unwrap();
    assert!(result.content.contains("Hello"));
    assert!(!result.content.contains("Site"));
    assert_eq!(result.pages_extracted, 1);
    assert_eq!(result.total_characters, result.content.chars().count() as u64);
    assert_eq!(result.completed_at, view.completed_at.unwrap());
}

#[tokio::test]
async fn test_selector_without_match_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<main>Hello</main>"))
        .mount(&server)
        .await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(ExtractionRequest::new(format!("{}/", server.uri())).with_selector("#missing"))
        .unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.is_some());
    assert!(matches!(
        orchestrator.get_result(id),
        Err(JobError::NotReady {
            status: JobStatus::Failed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_http_error_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(ExtractionRequest::new(format!("{}/broken", server.uri())))
        .unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Failed);
    assert!(view.error.unwrap().contains("HTTP 500"));
    assert_eq!(orchestrator.failures(id).unwrap().len(), 1);
}

#[tokio::test]
async fn test_pagination_respects_page_budget() {
    let server = MockServer::start().await;
    mount_chain(&server, 5, |n| if n <= 3 { 1 } else { 0 }).await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(
            ExtractionRequest::new(format!("{}/page/1", server.uri()))
                .with_selector("main")
                .with_pagination(3),
        )
        .unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.pages_extracted, 3);

    let result = orchestrator.get_result(id).unwrap();
    assert_eq!(
        result.content,
        "Content of page 1\n\nContent of page 2\n\nContent of page 3"
    );
    assert!(!result.content.contains("page 4"));
}

#[tokio::test]
async fn test_without_pagination_fetches_one_page() {
    let server = MockServer::start().await;
    mount_chain(&server, 3, |n| if n == 1 { 1 } else { 0 }).await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let mut request =
        ExtractionRequest::new(format!("{}/page/1", server.uri())).with_selector("main");
    request.max_pages = 10;
    let id = orchestrator.create(request).unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(orchestrator.get_result(id).unwrap().pages_extracted, 1);
}

#[tokio::test]
async fn test_pagination_stops_at_end_of_chain() {
    let server = MockServer::start().await;
    mount_chain(&server, 2, |_| 1).await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(
            ExtractionRequest::new(format!("{}/page/1", server.uri()))
                .with_selector("main")
                .with_pagination(50),
        )
        .unwrap();

    let view = wait_terminal(&orchestrator, id).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.pages_extracted, 2);
}

#[tokio::test]
async fn test_links_are_deduplicated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<main>
                <a href="/item/1">First</a>
                <a href="/item/1#details">First again</a>
                <a href="/item/2?utm_source=feed">Second</a>
                <a href="/item/2">Second again</a>
                <a href="mailto:team@example.com">Mail us</a>
            </main>"#,
        ))
        .mount(&server)
        .await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(
            ExtractionRequest::new(format!("{}/list", server.uri()))
                .with_selector("main")
                .with_links(),
        )
        .unwrap();

    wait_terminal(&orchestrator, id).await;
    let result = orchestrator.get_result(id).unwrap();
    assert_eq!(result.total_links, 2);
    assert_eq!(result.links[0].text, "First");
    assert_eq!(result.links[0].url, format!("{}/item/1", server.uri()));
    assert_eq!(result.links[1].text, "Second");
    assert!(result.content.contains(&format!("First — {}/item/1", server.uri())));
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<main>Slow</main>").set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();
    let id = orchestrator
        .create(ExtractionRequest::new(format!("{}/slow", server.uri())).with_selector("main"))
        .unwrap();
    wait_for(&orchestrator, id, |s| s == JobStatus::Processing).await;

    let first = orchestrator.cancel(id).unwrap();
    let second = orchestrator.cancel(id).unwrap();
    assert_eq!(first.status, JobStatus::Cancelled);
    assert_eq!(second.status, JobStatus::Cancelled);
    assert_eq!(first, second);

    // Let the in-flight fetch finish; the outcome must be discarded
    orchestrator.shutdown().await;
    assert_eq!(orchestrator.get_status(id).unwrap().status, JobStatus::Cancelled);
    assert!(matches!(
        orchestrator.get_result(id),
        Err(JobError::NotReady {
            status: JobStatus::Cancelled,
            ..
        })
    ));
}

#[tokio::test]
async fn test_unknown_and_pending_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("<main>Slow</main>").set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let config = parse_config("[service]\nmax-concurrent-jobs = 1\n").unwrap();
    let orchestrator = JobOrchestrator::from_config(&config).unwrap();

    assert!(matches!(
        orchestrator.get_result(JobId::new()),
        Err(JobError::NotFound(_))
    ));

    let busy = orchestrator
        .create(ExtractionRequest::new(format!("{}/a", server.uri())))
        .unwrap();
    wait_for(&orchestrator, busy, |s| s == JobStatus::Processing).await;

    let queued = orchestrator
        .create(ExtractionRequest::new(format!("{}/b", server.uri())))
        .unwrap();
    match orchestrator.get_result(queued) {
        Err(JobError::NotReady { status, message, .. }) => {
            assert_eq!(status, JobStatus::Pending);
            assert!(!message.is_empty());
        }
        other => panic!("expected NotReady, got {:?}", other),
    }

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let orchestrator = JobOrchestrator::from_config(&create_test_config()).unwrap();

    let cases = vec![
        ExtractionRequest::new(""),
        ExtractionRequest::new("not a url"),
        ExtractionRequest::new("https://example.com").with_pagination(0),
        ExtractionRequest::new("https://example.com").with_js(-1.0),
    ];
    for request in cases {
        assert!(matches!(
            orchestrator.create(request),
            Err(JobError::InvalidRequest(_))
        ));
    }
    assert_eq!(orchestrator.active_jobs(), 0);
}

#[tokio::test]
async fn test_sqlite_stores_survive_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<main>Persisted</main>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("harvest.db");
    let config = parse_config(&format!(
        r#"
        [storage]
        job-backend = "sqlite"
        result-backend = "sqlite"
        database-path = "{}"
        "#,
        db_path.display().to_string().replace('\\', "\\\\")
    ))
    .unwrap();

    let id = {
        let orchestrator = JobOrchestrator::from_config(&config).unwrap();
        let id = orchestrator
            .create(ExtractionRequest::new(format!("{}/", server.uri())).with_selector("main"))
            .unwrap();
        let view = wait_terminal(&orchestrator, id).await;
        assert_eq!(view.status, JobStatus::Completed);
        orchestrator.shutdown().await;
        id
    };

    let reopened = JobOrchestrator::from_config(&config).unwrap();
    assert_eq!(reopened.get_status(id).unwrap().status, JobStatus::Completed);
    assert_eq!(reopened.get_result(id).unwrap().content, "Persisted");
}
