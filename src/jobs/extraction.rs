//! Extraction jobs: bulk document snapshots delivered as files

use super::variant::{ExistingJob, JobResponse, JobVariant};
use crate::client::Endpoints;
use crate::error::{Error, Result};
use crate::types::JobKind;
use serde::{Deserialize, Serialize};

/// Result of a finished extraction or update
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFiles {
    /// File format reported by the service (e.g. "avro")
    pub format: String,
    /// File URIs in response order
    pub files: Vec<String>,
}

#[derive(Deserialize)]
struct FileItem {
    uri: String,
}

/// Shared result shaping for the extraction family
pub(crate) fn files_from_response(response: &JobResponse) -> Result<ExtractionFiles> {
    let format = response
        .data
        .attributes
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let files = match response.data.attributes.get("files") {
        Some(_) => response
            .attribute::<Vec<FileItem>>("files")?
            .into_iter()
            .map(|item| item.uri)
            .collect(),
        None => Vec::new(),
    };
    Ok(ExtractionFiles { format, files })
}

/// Trailing `-` segment of a composite server id
pub(crate) fn short_id(composite: &str) -> Result<String> {
    composite
        .rsplit('-')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidResponse(format!("malformed extraction id '{composite}'")))
}

/// Extraction variant
#[derive(Clone, Debug, Default)]
pub struct ExtractionJob {
    snapshot_id: Option<String>,
}

impl ExtractionJob {
    /// Create a variant for a new extraction
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to an extraction that was submitted earlier
    ///
    /// The resulting lifecycle is already submitted and can be polled directly.
    pub fn from_snapshot_id(snapshot_id: impl Into<String>) -> Result<Self> {
        let snapshot_id = snapshot_id.into();
        if snapshot_id.trim().is_empty() {
            return Err(Error::Construction("snapshot id is empty".into()));
        }
        Ok(Self {
            snapshot_id: Some(snapshot_id),
        })
    }

    /// Snapshot id this variant was attached to, if any
    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }
}

impl JobVariant for ExtractionJob {
    type Output = ExtractionFiles;

    fn kind(&self) -> JobKind {
        JobKind::Extraction
    }

    fn endpoint_for(&mut self, endpoints: &Endpoints) -> String {
        endpoints.snapshots()
    }

    fn extract_id(&self, response: &JobResponse) -> Result<String> {
        short_id(&response.data.id)
    }

    fn extract_result(&self, response: &JobResponse) -> Result<ExtractionFiles> {
        files_from_response(response)
    }

    fn existing_job(&self, endpoints: &Endpoints) -> Option<ExistingJob> {
        self.snapshot_id.as_ref().map(|id| ExistingJob {
            id: id.clone(),
            link: endpoints.extraction_link(id),
        })
    }

    fn result_files<'a>(&self, output: &'a ExtractionFiles) -> Option<&'a [String]> {
        Some(&output.files)
    }
}
