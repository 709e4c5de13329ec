//! End-to-end job lifecycle scenarios against a mock news-data service
//!
//! These tests drive `JobLifecycle::process()` through submission, polling
//! and file retrieval, verifying:
//! - Polls continue through non-terminal states until the job is done
//! - Result files land in a folder named after the job id, prefixed by update type
//! - Server-reported failures and unknown states surface as errors

mod common;

use common::{done_extraction, job_envelope, test_client, test_config};
use factiva_news::jobs::{ExtractionJob, JobLifecycle, JobOutcome, UpdateJob};
use factiva_news::{Error, Event, JobState, UpdateType};
use serde_json::json;
use serial_test::serial;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Restores the working directory when dropped
struct CwdGuard(std::path::PathBuf);

impl CwdGuard {
    fn enter(dir: &std::path::Path) -> Self {
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        Self(previous)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        std::env::set_current_dir(&self.0).ok();
    }
}

#[tokio::test]
#[serial]
async fn test_extraction_running_then_done_downloads_into_job_folder() {
    let server = MockServer::start().await;
    let status_link = format!(
        "{}/alpha/extractions/documents/dj-synhub-extraction-KEY-SNAP1",
        server.uri()
    );
    let file_uri = format!("{}/bucket/SNAP1/deletes/d1.avro", server.uri());
    let payload = json!({"query": {"where": "language_code = 'en'"}});

    Mock::given(method("POST"))
        .and(path("/alpha/extractions/documents"))
        .and(header("user-key", common::TEST_KEY))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(job_envelope(
            "dj-synhub-extraction-KEY-SNAP1",
            "JOB_CREATED",
            Some(&status_link),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alpha/extractions/documents/dj-synhub-extraction-KEY-SNAP1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_envelope(
            "dj-synhub-extraction-KEY-SNAP1",
            "RUNNING",
            None,
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alpha/extractions/documents/dj-synhub-extraction-KEY-SNAP1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(done_extraction(
                "dj-synhub-extraction-KEY-SNAP1",
                std::slice::from_ref(&file_uri),
            )),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/SNAP1/deletes/d1.avro"))
        .and(header("user-key", common::TEST_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"avro".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let _cwd = CwdGuard::enter(workdir.path());

    let config = test_config(&server.uri());
    let (tx, mut rx) = broadcast::channel(32);
    let mut job =
        JobLifecycle::new(test_client(&config), ExtractionJob::new(), &config).with_events(tx);

    let outcome = job
        .process(Some(&payload), &CancellationToken::new())
        .await
        .unwrap();

    let JobOutcome::Completed { result, downloaded } = outcome else {
        panic!("job was cancelled");
    };
    assert_eq!(job.job().id(), "SNAP1");
    assert_eq!(job.job().state(), Some(JobState::Done));
    assert_eq!(result.files, vec![file_uri]);
    assert_eq!(downloaded.len(), 1);

    let expected = std::env::current_dir().unwrap().join("SNAP1").join("deletes-d1.avro");
    assert_eq!(downloaded[0], expected);
    assert_eq!(std::fs::read(&expected).unwrap(), b"avro");

    let folder_entries = std::fs::read_dir(workdir.path().join("SNAP1")).unwrap().count();
    assert_eq!(folder_entries, 1);

    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::JobStateChanged { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec![JobState::Running, JobState::Done]);
}

#[tokio::test]
async fn test_poll_before_submit_is_not_submitted() {
    let server = MockServer::start().await;
    let config = test_config(&server.uri());
    let variant = UpdateJob::for_snapshot("SNAP1", UpdateType::Deletes).unwrap();
    let mut job = JobLifecycle::new(test_client(&config), variant, &config);

    assert!(matches!(job.poll().await, Err(Error::NotSubmitted)));
}

#[tokio::test]
async fn test_failed_job_surfaces_all_errors_in_order() {
    let server = MockServer::start().await;
    let link = format!("{}/status/SNAP2", server.uri());
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(job_envelope(
            "dj-synhub-extraction-KEY-SNAP2",
            "JOB_QUEUED",
            Some(&link),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/SNAP2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "dj-synhub-extraction-KEY-SNAP2", "attributes": {"current_state": "JOB_STATE_FAILED"}},
            "errors": [
                {"title": "First", "detail": "one"},
                {"title": "Second", "detail": "two"},
                {"title": "Third", "detail": "three"}
            ]
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut job = JobLifecycle::new(test_client(&config), ExtractionJob::new(), &config);
    let err = job.process(None, &CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.error_code(), "job_failed");
    assert_eq!(
        err.to_string(),
        "job failed with error: First: one,Second: two,Third: three"
    );
}

#[tokio::test]
async fn test_unexpected_state_stops_processing() {
    let server = MockServer::start().await;
    let link = format!("{}/status/abc", server.uri());
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(job_envelope(
            "dj-synhub-extraction-KEY-abc",
            "JOB_QUEUED",
            Some(&link),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_envelope(
            "dj-synhub-extraction-KEY-abc",
            "JOB_STATE_MYSTERY",
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut job = JobLifecycle::new(test_client(&config), ExtractionJob::new(), &config);
    let result = job.process(None, &CancellationToken::new()).await;

    assert!(matches!(result, Err(Error::UnexpectedState(ref s)) if s == "JOB_STATE_MYSTERY"));
}

#[tokio::test]
async fn test_update_from_id_matches_explicit_update() {
    let from_id = UpdateJob::from_update_id("SNAP123-additions-20230101").unwrap();
    let explicit = UpdateJob::for_snapshot("SNAP123", UpdateType::Additions).unwrap();

    assert_eq!(from_id.snapshot_id(), "SNAP123");
    assert_eq!(from_id.snapshot_id(), explicit.snapshot_id());
    assert_eq!(from_id.update_type(), explicit.update_type());
}
