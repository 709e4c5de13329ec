//! Explain jobs: document-count estimates for a query

use super::variant::{JobResponse, JobVariant};
use crate::client::Endpoints;
use crate::error::Result;
use crate::types::JobKind;

/// Explain variant
///
/// Normally submits to the `_explain` endpoint. [`request_samples`](Self::request_samples)
/// arms a one-shot switch so the next endpoint lookup resolves to the samples
/// endpoint instead; the switch resets as soon as it is consumed.
#[derive(Clone, Debug, Default)]
pub struct ExplainJob {
    samples_requested: bool,
}

impl ExplainJob {
    /// Create an explain variant in documents mode
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the next endpoint lookup to the samples endpoint
    pub fn request_samples(&mut self) {
        self.samples_requested = true;
    }

    /// Whether the samples switch is armed
    pub fn samples_requested(&self) -> bool {
        self.samples_requested
    }
}

impl JobVariant for ExplainJob {
    /// Estimated number of matching documents
    type Output = u64;

    fn kind(&self) -> JobKind {
        JobKind::Explain
    }

    fn endpoint_for(&mut self, endpoints: &Endpoints) -> String {
        let endpoint = if self.samples_requested {
            endpoints.samples()
        } else {
            endpoints.explain()
        };
        self.samples_requested = false;
        endpoint
    }

    fn extract_id(&self, response: &JobResponse) -> Result<String> {
        Ok(response.data.id.clone())
    }

    fn extract_result(&self, response: &JobResponse) -> Result<u64> {
        response.attribute("counts")
    }
}
