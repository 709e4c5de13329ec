//! Error types for factiva-news
//!
//! This module provides the error taxonomy for the library:
//! - Job lifecycle errors (submission, polling, server-reported failures)
//! - Construction errors for mutually exclusive job parameters
//! - Subscription bookkeeping errors
//! - Transport errors (HTTP status, network, I/O, serialization)
//!
//! Every variant maps to a stable machine-readable code via [`Error::error_code`].

use thiserror::Error;

/// Result type alias for factiva-news operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for factiva-news
#[derive(Debug, Error)]
pub enum Error {
    /// Job creation request was rejected or returned a malformed envelope.
    /// The job stays unsubmitted.
    #[error("job submission to {endpoint} failed: {message}")]
    Submission {
        /// Endpoint the creation request was sent to
        endpoint: String,
        /// Transport or structural failure description
        message: String,
    },

    /// Poll attempted on a job that has no result link
    #[error("job has not yet been submitted or job id was not set")]
    NotSubmitted,

    /// Server reported a job state outside the known set
    #[error("unexpected job state: {0}")]
    UnexpectedState(String),

    /// Server reported the failure terminal; carries `title: detail` pairs
    #[error("job failed with error: {0}")]
    JobFailed(String),

    /// Download requested for a job without result files
    #[error("no files available for download")]
    NoFilesAvailable,

    /// Mutually exclusive or incomplete constructor parameters
    #[error("invalid job construction: {0}")]
    Construction(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "FACTIVA_APIKEY")
        key: Option<String>,
    },

    /// Caller supplied an argument outside the accepted range
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Subscription create/delete precondition violated
    #[error("subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Remote endpoint answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body (possibly truncated)
        body: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Subscription-related errors
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Create called on a subscription that already has a server id
    #[error("subscription {id} already created")]
    AlreadyCreated {
        /// The existing subscription id
        id: String,
    },

    /// Delete or listen called on a subscription without a server id
    #[error("subscription has not been created")]
    NotCreated,

    /// Subscription id is not known to the stream
    #[error("subscription {id} does not belong to stream {stream_id}")]
    Unknown {
        /// The requested subscription id
        id: String,
        /// The stream that was searched
        stream_id: String,
    },

    /// Stream operation requires a stream id
    #[error("stream id is not set")]
    MissingStreamId,
}

impl Error {
    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Submission { .. } => "submission_error",
            Error::NotSubmitted => "not_submitted",
            Error::UnexpectedState(_) => "unexpected_state",
            Error::JobFailed(_) => "job_failed",
            Error::NoFilesAvailable => "no_files_available",
            Error::Construction(_) => "construction_error",
            Error::Config { .. } => "config_error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidResponse(_) => "invalid_response",
            Error::Subscription(e) => match e {
                SubscriptionError::AlreadyCreated { .. } => "subscription_already_created",
                SubscriptionError::NotCreated => "subscription_not_created",
                SubscriptionError::Unknown { .. } => "subscription_unknown",
                SubscriptionError::MissingStreamId => "missing_stream_id",
            },
            Error::Http { .. } => "http_error",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether the error came from the transport layer rather than job semantics
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http { .. } | Error::Network(_) | Error::Io(_) | Error::Serialization(_)
        )
    }
}
