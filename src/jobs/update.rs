//! Update jobs: additions, replacements or deletes since a snapshot ran
//!
//! An update is identified either by a composite update id
//! (`{snapshot}-{type}-{timestamp}`) or by an explicit snapshot id and
//! [`UpdateType`]. The two forms are mutually exclusive; [`UpdateSpec`]
//! makes that choice at construction time.

use super::extraction::{ExtractionFiles, files_from_response};
use super::variant::{ExistingJob, JobResponse, JobVariant};
use crate::client::Endpoints;
use crate::error::{Error, Result};
use crate::types::{JobKind, UpdateType};

/// Decomposed update identifier
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateId {
    /// Snapshot being updated
    pub snapshot_id: String,
    /// Kind of update
    pub update_type: UpdateType,
    /// Creation timestamp segment, when present
    pub stamp: Option<String>,
}

impl UpdateId {
    /// Parse `SNAPSHOT-type[-stamp]`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, '-');
        let snapshot_id = parts.next().unwrap_or_default();
        let update_type = parts.next().unwrap_or_default();
        if snapshot_id.is_empty() || update_type.is_empty() {
            return Err(Error::Construction(format!(
                "update id '{raw}' must look like SNAPSHOT-type-timestamp"
            )));
        }
        Ok(Self {
            snapshot_id: snapshot_id.to_string(),
            update_type: update_type.parse()?,
            stamp: parts.next().filter(|s| !s.is_empty()).map(str::to_string),
        })
    }
}

impl std::fmt::Display for UpdateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.snapshot_id, self.update_type)?;
        if let Some(stamp) = &self.stamp {
            write!(f, "-{stamp}")?;
        }
        Ok(())
    }
}

/// How an update job is identified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateSpec {
    /// Attach to an update submitted earlier
    Existing(UpdateId),
    /// Create a new update for a snapshot
    New {
        /// Snapshot being updated
        snapshot_id: String,
        /// Kind of update
        update_type: UpdateType,
    },
}

impl UpdateSpec {
    /// Validate loosely-typed inputs, e.g. from a config file or CLI
    ///
    /// # Errors
    /// [`Error::Construction`] when `update_id` is combined with either of the
    /// other fields, or when neither form is complete.
    pub fn from_parts(
        update_id: Option<&str>,
        update_type: Option<&str>,
        snapshot_id: Option<&str>,
    ) -> Result<Self> {
        match (update_id, update_type, snapshot_id) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::Construction(
                "update id is not compatible with update type and snapshot id".into(),
            )),
            (Some(id), None, None) => Ok(UpdateSpec::Existing(UpdateId::parse(id)?)),
            (None, Some(kind), Some(snapshot)) if !snapshot.is_empty() => Ok(UpdateSpec::New {
                snapshot_id: snapshot.to_string(),
                update_type: kind.parse()?,
            }),
            _ => Err(Error::Construction(
                "not enough parameters to create an update job".into(),
            )),
        }
    }

    /// Snapshot being updated
    pub fn snapshot_id(&self) -> &str {
        match self {
            UpdateSpec::Existing(id) => &id.snapshot_id,
            UpdateSpec::New { snapshot_id, .. } => snapshot_id,
        }
    }

    /// Kind of update
    pub fn update_type(&self) -> UpdateType {
        match self {
            UpdateSpec::Existing(id) => id.update_type,
            UpdateSpec::New { update_type, .. } => *update_type,
        }
    }
}

/// Update variant; shares result shaping with extractions
#[derive(Clone, Debug)]
pub struct UpdateJob {
    spec: UpdateSpec,
}

impl UpdateJob {
    /// Create from validated identification
    pub fn new(spec: UpdateSpec) -> Self {
        Self { spec }
    }

    /// Attach to an existing update by its composite id
    pub fn from_update_id(update_id: &str) -> Result<Self> {
        Ok(Self::new(UpdateSpec::Existing(UpdateId::parse(update_id)?)))
    }

    /// Prepare a new update for a snapshot
    pub fn for_snapshot(snapshot_id: impl Into<String>, update_type: UpdateType) -> Result<Self> {
        let snapshot_id = snapshot_id.into();
        if snapshot_id.trim().is_empty() {
            return Err(Error::Construction("snapshot id is empty".into()));
        }
        Ok(Self::new(UpdateSpec::New {
            snapshot_id,
            update_type,
        }))
    }

    /// Identification this job was built with
    pub fn spec(&self) -> &UpdateSpec {
        &self.spec
    }

    /// Snapshot being updated
    pub fn snapshot_id(&self) -> &str {
        self.spec.snapshot_id()
    }

    /// Kind of update
    pub fn update_type(&self) -> UpdateType {
        self.spec.update_type()
    }
}

impl JobVariant for UpdateJob {
    type Output = ExtractionFiles;

    fn kind(&self) -> JobKind {
        JobKind::Update
    }

    fn endpoint_for(&mut self, endpoints: &Endpoints) -> String {
        endpoints.update(self.snapshot_id(), self.update_type().as_str())
    }

    // {prefix}-{KEY}-{SNAPSHOT}-{TYPE}-{STAMP}: keep the last three segments
    fn extract_id(&self, response: &JobResponse) -> Result<String> {
        let segments: Vec<&str> = response.data.id.split('-').collect();
        if segments.len() < 3 {
            return Err(Error::InvalidResponse(format!(
                "malformed update id '{}'",
                response.data.id
            )));
        }
        let id = segments[segments.len() - 3..].join("-");
        UpdateId::parse(&id).map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(id)
    }

    fn extract_result(&self, response: &JobResponse) -> Result<ExtractionFiles> {
        files_from_response(response)
    }

    fn existing_job(&self, endpoints: &Endpoints) -> Option<ExistingJob> {
        match &self.spec {
            UpdateSpec::Existing(id) => {
                let id = id.to_string();
                Some(ExistingJob {
                    link: endpoints.extraction_link(&id),
                    id,
                })
            }
            UpdateSpec::New { .. } => None,
        }
    }

    fn result_files<'a>(&self, output: &'a ExtractionFiles) -> Option<&'a [String]> {
        Some(&output.files)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::UserKey;
    use serde_json::json;

    fn endpoints() -> Endpoints {
        Endpoints::new("https://api.example.com", &UserKey::new("KEY").unwrap())
    }

    #[test]
    fn test_update_id_matches_explicit_construction() {
        let from_id = UpdateJob::from_update_id("SNAP123-additions-20230101").unwrap();
        let explicit = UpdateJob::for_snapshot("SNAP123", UpdateType::Additions).unwrap();
        assert_eq!(from_id.snapshot_id(), explicit.snapshot_id());
        assert_eq!(from_id.update_type(), explicit.update_type());
        assert_eq!(from_id.snapshot_id(), "SNAP123");
        assert_eq!(from_id.update_type(), UpdateType::Additions);
    }

    #[test]
    fn test_update_id_display_round_trips() {
        let id = UpdateId::parse("SNAP123-deletes-20230101120000").unwrap();
        assert_eq!(id.stamp.as_deref(), Some("20230101120000"));
        assert_eq!(id.to_string(), "SNAP123-deletes-20230101120000");
    }

    #[test]
    fn test_from_parts_rejects_both_forms() {
        let err = UpdateSpec::from_parts(
            Some("SNAP123-additions-20230101"),
            Some("additions"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Construction(_)));

        let err = UpdateSpec::from_parts(Some("SNAP123-additions-20230101"), None, Some("SNAP123"))
            .unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn test_from_parts_rejects_incomplete() {
        assert!(UpdateSpec::from_parts(None, Some("additions"), None).is_err());
        assert!(UpdateSpec::from_parts(None, None, Some("SNAP123")).is_err());
        assert!(UpdateSpec::from_parts(None, None, None).is_err());
    }

    #[test]
    fn test_from_parts_accepts_each_form() {
        let existing = UpdateSpec::from_parts(Some("SNAP1-replacements-2023"), None, None).unwrap();
        assert_eq!(existing.update_type(), UpdateType::Replacements);

        let new = UpdateSpec::from_parts(None, Some("deletes"), Some("SNAP1")).unwrap();
        assert_eq!(
            new,
            UpdateSpec::New {
                snapshot_id: "SNAP1".into(),
                update_type: UpdateType::Deletes
            }
        );
    }

    #[test]
    fn test_endpoint_encodes_update_type() {
        let mut job = UpdateJob::for_snapshot("SNAP1", UpdateType::Replacements).unwrap();
        assert_eq!(
            job.endpoint_for(&endpoints()),
            "https://api.example.com/alpha/extractions/dj-synhub-extraction-KEY-SNAP1/replacements"
        );
    }

    #[test]
    fn test_extract_id_keeps_last_three_segments() {
        let response: JobResponse = serde_json::from_value(json!({
            "data": {
                "id": "dj-synhub-extraction-KEY-SNAP1-additions-20230101",
                "attributes": {"current_state": "JOB_QUEUED"}
            }
        }))
        .unwrap();
        let job = UpdateJob::for_snapshot("SNAP1", UpdateType::Additions).unwrap();
        assert_eq!(job.extract_id(&response).unwrap(), "SNAP1-additions-20230101");
    }

    #[test]
    fn test_existing_update_link() {
        let job = UpdateJob::from_update_id("SNAP1-deletes-20230101").unwrap();
        let existing = job.existing_job(&endpoints()).unwrap();
        assert_eq!(existing.id, "SNAP1-deletes-20230101");
        assert!(existing.link.ends_with("dj-synhub-extraction-KEY-SNAP1-deletes-20230101"));
    }
}
