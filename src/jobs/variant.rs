//! The capability interface each job variant supplies to the lifecycle engine

use crate::client::Endpoints;
use crate::error::{Error, Result};
use crate::types::JobKind;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decoded job envelope: `{data: {id, attributes}, links: {self}, errors: [...]}`
#[derive(Clone, Debug, Deserialize)]
pub struct JobResponse {
    /// Job resource
    pub data: JobResource,
    /// Resource links
    #[serde(default)]
    pub links: Option<JobLinks>,
    /// Errors reported for failed jobs
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

/// The `data` member of a job envelope
#[derive(Clone, Debug, Deserialize)]
pub struct JobResource {
    /// Server-assigned (possibly composite) id
    pub id: String,
    /// Variant-specific attributes, including `current_state`
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// The `links` member of a job envelope
#[derive(Clone, Debug, Deserialize)]
pub struct JobLinks {
    /// Canonical status URL
    #[serde(rename = "self", default)]
    pub self_link: Option<String>,
}

/// One entry of the `errors` array
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorEntry {
    /// Short error title
    #[serde(default)]
    pub title: String,
    /// Error detail
    #[serde(default)]
    pub detail: String,
}

impl JobResponse {
    /// The `current_state` attribute
    pub fn current_state(&self) -> Result<&str> {
        self.data
            .attributes
            .get("current_state")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse("job response has no current_state".into()))
    }

    /// The `self` link
    pub fn self_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.self_link.as_deref())
    }

    /// Deserialize one attribute
    pub fn attribute<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .data
            .attributes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidResponse(format!("job response has no '{name}' attribute")))?;
        Ok(serde_json::from_value(value)?)
    }

    /// All reported errors as `title: detail` pairs joined by commas, in response order
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.title, e.detail))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A job the server already knows about, e.g. a snapshot created in a previous run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExistingJob {
    /// Short job id
    pub id: String,
    /// Canonical status link
    pub link: String,
}

/// Variant-specific behavior consumed by [`JobLifecycle`](super::JobLifecycle)
///
/// The lifecycle never inspects the concrete variant; everything it needs
/// flows through these methods.
pub trait JobVariant: Send + Sync {
    /// Decoded result stored when the job reaches the success terminal
    type Output: Clone + std::fmt::Debug + Send + Sync;

    /// Variant discriminator, used for logging and events
    fn kind(&self) -> JobKind;

    /// Creation URL for the next submission
    ///
    /// Takes `&mut self` so variants can implement one-shot mode switches.
    fn endpoint_for(&mut self, endpoints: &Endpoints) -> String;

    /// Job id from a creation response
    fn extract_id(&self, response: &JobResponse) -> Result<String>;

    /// Result payload from a success-terminal response
    fn extract_result(&self, response: &JobResponse) -> Result<Self::Output>;

    /// Identity of an already-submitted job this variant was built from
    fn existing_job(&self, _endpoints: &Endpoints) -> Option<ExistingJob> {
        None
    }

    /// Files to retrieve once the job is done (extraction family only)
    fn result_files<'a>(&self, _output: &'a Self::Output) -> Option<&'a [String]> {
        None
    }
}
