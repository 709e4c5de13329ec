//! Core types and events for factiva-news

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server-reported state of an asynchronous job
///
/// Only allow-listed values parse; anything else is an
/// [`Error::UnexpectedState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Accepted by the server, not yet scheduled
    Created,
    /// Waiting for an executor
    Queued,
    /// Query is being validated
    Validating,
    /// Scheduled but not started
    Pending,
    /// Waiting on an upstream resource
    Waiting,
    /// Executing
    Running,
    /// Success terminal
    Done,
    /// Failure terminal
    Failed,
}

impl JobState {
    /// Parse a state string from a response envelope
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "JOB_CREATED" => Ok(JobState::Created),
            "JOB_QUEUED" => Ok(JobState::Queued),
            "JOB_VALIDATING" => Ok(JobState::Validating),
            "JOB_STATE_PENDING" => Ok(JobState::Pending),
            "JOB_STATE_WAITING" => Ok(JobState::Waiting),
            "JOB_STATE_RUNNING" | "RUNNING" => Ok(JobState::Running),
            "JOB_STATE_DONE" => Ok(JobState::Done),
            "JOB_STATE_FAILED" => Ok(JobState::Failed),
            other => Err(Error::UnexpectedState(other.to_string())),
        }
    }

    /// Canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "JOB_CREATED",
            JobState::Queued => "JOB_QUEUED",
            JobState::Validating => "JOB_VALIDATING",
            JobState::Pending => "JOB_STATE_PENDING",
            JobState::Waiting => "JOB_STATE_WAITING",
            JobState::Running => "JOB_STATE_RUNNING",
            JobState::Done => "JOB_STATE_DONE",
            JobState::Failed => "JOB_STATE_FAILED",
        }
    }

    /// Whether no further polling is expected
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job variant discriminator, used for logging and events only
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Document-count estimate
    Explain,
    /// Aggregated counts
    Analytics,
    /// Bulk document extraction
    Extraction,
    /// Incremental snapshot update
    Update,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobKind::Explain => "explain",
            JobKind::Analytics => "analytics",
            JobKind::Extraction => "extraction",
            JobKind::Update => "update",
        };
        f.write_str(name)
    }
}

/// Kind of snapshot update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Newly published documents
    Additions,
    /// Documents whose content changed
    Replacements,
    /// Documents withdrawn from the snapshot
    Deletes,
}

impl UpdateType {
    /// Path segment used in update endpoints and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Additions => "additions",
            UpdateType::Replacements => "replacements",
            UpdateType::Deletes => "deletes",
        }
    }
}

impl std::fmt::Display for UpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UpdateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "additions" => Ok(UpdateType::Additions),
            "replacements" => Ok(UpdateType::Replacements),
            "deletes" => Ok(UpdateType::Deletes),
            other => Err(Error::Construction(format!(
                "unknown update type '{other}', expected additions, replacements or deletes"
            ))),
        }
    }
}

/// Events emitted by jobs, consumers and the quota monitor
///
/// Subscribe by handing a `tokio::sync::broadcast::Sender<Event>` to the
/// component's `with_events` builder.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A creation request was accepted
    JobSubmitted {
        /// Variant that was submitted
        kind: JobKind,
        /// Server-assigned job id
        job_id: String,
        /// Canonical status link
        link: String,
    },

    /// A poll observed a (possibly unchanged) state
    JobStateChanged {
        /// Job id
        job_id: String,
        /// Observed state
        state: JobState,
    },

    /// The job reached the success terminal and its result was stored
    JobCompleted {
        /// Job id
        job_id: String,
    },

    /// Result files were written to disk
    FilesDownloaded {
        /// Job id
        job_id: String,
        /// Folder holding the files
        folder: PathBuf,
        /// Number of files written
        count: usize,
    },

    /// A pull cycle finished processing messages
    MessagesProcessed {
        /// Subscription consumed from
        subscription_id: String,
        /// Session total so far
        total: usize,
    },

    /// The stream stopped enqueueing new documents
    StreamDisabled {
        /// Stream id
        stream_id: String,
        /// Account document cap, when known
        max_allowed_extractions: Option<u64>,
    },
}
