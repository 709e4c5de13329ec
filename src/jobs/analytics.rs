//! Analytics jobs: aggregated counts grouped by time and dimension

use super::variant::{JobResponse, JobVariant};
use crate::client::Endpoints;
use crate::error::Result;
use crate::types::JobKind;
use serde_json::Value;

/// Analytics variant
#[derive(Clone, Debug, Default)]
pub struct AnalyticsJob;

impl AnalyticsJob {
    /// Create an analytics variant
    pub fn new() -> Self {
        Self
    }
}

impl JobVariant for AnalyticsJob {
    /// Aggregation rows as returned by the service
    type Output = Vec<Value>;

    fn kind(&self) -> JobKind {
        JobKind::Analytics
    }

    fn endpoint_for(&mut self, endpoints: &Endpoints) -> String {
        endpoints.analytics()
    }

    fn extract_id(&self, response: &JobResponse) -> Result<String> {
        Ok(response.data.id.clone())
    }

    fn extract_result(&self, response: &JobResponse) -> Result<Vec<Value>> {
        response.attribute("results")
    }
}
