//! Asynchronous job lifecycle engine
//!
//! A [`JobLifecycle`] drives one [`JobVariant`] through
//! submit → poll → terminal resolution:
//!
//! ```text
//! UNSUBMITTED --submit--> SUBMITTED --poll--> {QUEUED, RUNNING, ...} --poll--> DONE | FAILED
//! ```
//!
//! Polling runs at a constant interval with no attempt limit. Callers stop a
//! wait through the [`CancellationToken`] passed to [`JobLifecycle::process`].

pub mod analytics;
pub mod explain;
pub mod extraction;
pub mod files;
pub mod update;
pub mod variant;


pub use analytics::AnalyticsJob;
pub use explain::ExplainJob;
pub use extraction::{ExtractionFiles, ExtractionJob};
pub use files::{FileRetrievalManager, file_name_for};
pub use update::{UpdateId, UpdateJob, UpdateSpec};
pub use variant::{ExistingJob, JobResponse, JobVariant};

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Event, JobState};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// One server-side unit of work
#[derive(Clone, Debug)]
pub struct Job<T> {
    id: String,
    state: Option<JobState>,
    raw_state: Option<String>,
    result_link: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    result: Option<T>,
}

impl<T> Default for Job<T> {
    fn default() -> Self {
        Self {
            id: String::new(),
            state: None,
            raw_state: None,
            result_link: None,
            submitted_at: None,
            result: None,
        }
    }
}

impl<T> Job<T> {
    /// Server-assigned id (empty before submission)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last observed state, `None` before submission or after an unknown state
    pub fn state(&self) -> Option<JobState> {
        self.state
    }

    /// Last state string exactly as the server reported it
    pub fn raw_state(&self) -> Option<&str> {
        self.raw_state.as_deref()
    }

    /// Canonical status URL
    pub fn result_link(&self) -> Option<&str> {
        self.result_link.as_deref()
    }

    /// Time of the most recent submission attempt
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Decoded result, present once the job is done
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Whether a status link is known
    pub fn is_submitted(&self) -> bool {
        self.result_link.is_some()
    }
}

/// How [`JobLifecycle::process`] ended
#[derive(Clone, Debug)]
pub enum JobOutcome<T> {
    /// The job reached the success terminal
    Completed {
        /// Decoded result
        result: T,
        /// Local paths of retrieved result files (extraction family only)
        downloaded: Vec<PathBuf>,
    },
    /// The cancellation token fired while waiting
    Cancelled,
}

/// Drives a job variant through its server-side lifecycle
pub struct JobLifecycle<V: JobVariant> {
    client: ApiClient,
    variant: V,
    job: Job<V::Output>,
    poll_interval: Duration,
    files: FileRetrievalManager,
    download_folder: Option<PathBuf>,
    events: Option<broadcast::Sender<Event>>,
    span: tracing::Span,
}

impl<V: JobVariant> JobLifecycle<V> {
    /// Create a lifecycle for `variant`
    ///
    /// Variants built from an existing server id start out submitted.
    pub fn new(client: ApiClient, variant: V, config: &Config) -> Self {
        let mut job = Job::default();
        if let Some(existing) = variant.existing_job(client.endpoints()) {
            job.id = existing.id;
            job.result_link = Some(existing.link);
        }
        let span = tracing::info_span!("job", kind = %variant.kind());
        let files = FileRetrievalManager::new(client.clone(), config.downloads.max_concurrent_files);

        Self {
            client,
            variant,
            job,
            poll_interval: config.jobs.poll_interval,
            files,
            download_folder: None,
            events: None,
            span,
        }
    }

    /// Override the wait between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Download result files here instead of `./{job_id}`
    pub fn with_download_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.download_folder = Some(folder.into());
        self
    }

    /// Publish progress events on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run all logging inside `span`
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Job record
    pub fn job(&self) -> &Job<V::Output> {
        &self.job
    }

    /// Variant strategy
    pub fn variant(&self) -> &V {
        &self.variant
    }

    /// Mutable variant strategy
    pub fn variant_mut(&mut self) -> &mut V {
        &mut self.variant
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.send(event).ok();
        }
    }

    /// Send the creation request
    ///
    /// Every call starts a fresh job record. On failure the record stays
    /// unsubmitted apart from `submitted_at`.
    ///
    /// # Errors
    /// [`Error::Submission`] for transport failures or a malformed envelope,
    /// [`Error::UnexpectedState`] if the initial state is unknown.
    pub async fn submit(&mut self, payload: Option<&Value>) -> Result<()> {
        let span = self.span.clone();
        async {
            let endpoint = self.variant.endpoint_for(self.client.endpoints());
            self.job = Job {
                submitted_at: Some(Utc::now()),
                ..Job::default()
            };

            let submission = |message: String| Error::Submission {
                endpoint: endpoint.clone(),
                message,
            };

            let body = self
                .client
                .post_json(&endpoint, payload)
                .await
                .map_err(|e| submission(e.to_string()))?;
            let response: JobResponse =
                serde_json::from_value(body).map_err(|e| submission(e.to_string()))?;

            let id = self
                .variant
                .extract_id(&response)
                .map_err(|e| submission(e.to_string()))?;
            let raw_state = response
                .current_state()
                .map_err(|e| submission(e.to_string()))?;
            let state = JobState::parse(raw_state)?;
            let link = response
                .self_link()
                .ok_or_else(|| submission("response has no self link".to_string()))?
                .to_string();

            tracing::info!(job_id = %id, state = %state, link = %link, "job submitted");
            self.emit(Event::JobSubmitted {
                kind: self.variant.kind(),
                job_id: id.clone(),
                link: link.clone(),
            });

            self.job.id = id;
            self.job.state = Some(state);
            self.job.raw_state = Some(raw_state.to_string());
            self.job.result_link = Some(link);
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Read the job status once
    ///
    /// # Errors
    /// [`Error::NotSubmitted`] without a status link, [`Error::UnexpectedState`]
    /// for unknown states and [`Error::JobFailed`] when the server reports failure.
    pub async fn poll(&mut self) -> Result<JobState> {
        let span = self.span.clone();
        async {
            let link = self.job.result_link.clone().ok_or(Error::NotSubmitted)?;
            let body = self.client.get_json(&link).await?;
            let response: JobResponse = serde_json::from_value(body)?;
            let raw_state = response.current_state()?;

            let parsed = JobState::parse(raw_state);
            self.job.raw_state = Some(raw_state.to_string());
            self.job.state = parsed.as_ref().ok().copied();
            let state = parsed?;
            tracing::debug!(job_id = %self.job.id, state = %state, "job polled");
            self.emit(Event::JobStateChanged {
                job_id: self.job.id.clone(),
                state,
            });

            match state {
                JobState::Failed => {
                    let summary = response.error_summary();
                    tracing::warn!(job_id = %self.job.id, errors = %summary, "job failed");
                    Err(Error::JobFailed(summary))
                }
                JobState::Done => {
                    self.job.result = Some(self.variant.extract_result(&response)?);
                    tracing::info!(job_id = %self.job.id, "job completed");
                    self.emit(Event::JobCompleted {
                        job_id: self.job.id.clone(),
                    });
                    Ok(state)
                }
                _ => Ok(state),
            }
        }
        .instrument(span)
        .await
    }

    /// Submit, then wait for the success terminal and retrieve result files
    pub async fn process(
        &mut self,
        payload: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome<V::Output>> {
        if cancel.is_cancelled() {
            return Ok(JobOutcome::Cancelled);
        }
        self.submit(payload).await?;
        self.wait(cancel).await
    }

    /// Poll an already-submitted job until it is done, then retrieve result files
    ///
    /// The first poll happens immediately; later polls are `poll_interval` apart.
    ///
    /// # Errors
    /// Anything [`poll`](Self::poll) returns, and [`Error::NoFilesAvailable`]
    /// when an extraction-family job finishes without files.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<JobOutcome<V::Output>> {
        let mut state = self.poll().await?;
        while !state.is_terminal() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(parent: &self.span, job_id = %self.job.id, "job wait cancelled");
                    return Ok(JobOutcome::Cancelled);
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            state = self.poll().await?;
        }

        let result = self
            .job
            .result
            .clone()
            .ok_or_else(|| Error::InvalidResponse("job done without a result".into()))?;

        // extraction-family results always go through retrieval, even when empty
        let downloaded = if self.variant.result_files(&result).is_some() {
            let folder = self.download_folder.clone();
            self.download_files(folder.as_deref()).await?
        } else {
            Vec::new()
        };

        Ok(JobOutcome::Completed { result, downloaded })
    }

    /// Download the result files of a finished job
    ///
    /// # Errors
    /// [`Error::NoFilesAvailable`] if the job has no result files.
    pub async fn download_files(&self, destination: Option<&Path>) -> Result<Vec<PathBuf>> {
        let files = self
            .job
            .result
            .as_ref()
            .and_then(|result| self.variant.result_files(result))
            .unwrap_or_default();

        let paths = self
            .files
            .retrieve_all(&self.job.id, files, destination)
            .instrument(self.span.clone())
            .await?;

        if let Some(folder) = paths.first().and_then(|p| p.parent()) {
            self.emit(Event::FilesDownloaded {
                job_id: self.job.id.clone(),
                folder: folder.to_path_buf(),
                count: paths.len(),
            });
        }
        Ok(paths)
    }
}

impl JobLifecycle<ExplainJob> {
    /// Fetch up to `num_samples` sample documents for a submitted explain job
    pub async fn samples(&mut self, num_samples: u32) -> Result<Vec<Value>> {
        if self.job.id.is_empty() {
            return Err(Error::NotSubmitted);
        }
        self.variant.request_samples();
        let url = format!(
            "{}/{}",
            self.variant.endpoint_for(self.client.endpoints()),
            self.job.id
        );

        let body = self
            .client
            .get_json_with_query(&url, &[("num_samples", num_samples.to_string())])
            .instrument(self.span.clone())
            .await?;
        let samples = body
            .pointer("/data/attributes/sample")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("samples response has no sample list".into()))?;
        Ok(serde_json::from_value(samples)?)
    }
}
