//! Result file retrieval for the extraction family

use crate::client::ApiClient;
use crate::error::{Error, Result};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

/// Local file name for a result URI
///
/// The last path segment is prefixed with the update type found in the URI so
/// that additions, replacements and deletes of one snapshot never collide.
/// Prefixes are checked in the order deletes, additions, replacements.
pub fn file_name_for(uri: &str) -> String {
    let base = uri.rsplit('/').next().unwrap_or(uri);
    let prefix = if uri.contains("deletes") {
        "deletes-"
    } else if uri.contains("additions") {
        "additions-"
    } else if uri.contains("replacements") {
        "replacements-"
    } else {
        ""
    };
    format!("{prefix}{base}")
}

/// Downloads every file of a finished job into one folder
#[derive(Clone, Debug)]
pub struct FileRetrievalManager {
    client: ApiClient,
    max_concurrent: usize,
}

impl FileRetrievalManager {
    /// Create a manager; `max_concurrent` is clamped to at least 1
    pub fn new(client: ApiClient, max_concurrent: usize) -> Self {
        Self {
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Download `files` into `destination` (default: `./{job_id}`)
    ///
    /// Returns local paths in the order of `files`. Every download is attempted;
    /// the first failure is reported after the rest have finished and files
    /// already written stay on disk.
    ///
    /// # Errors
    /// [`Error::NoFilesAvailable`] for an empty list, otherwise the first
    /// transport or I/O failure.
    pub async fn retrieve_all(
        &self,
        job_id: &str,
        files: &[String],
        destination: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        if files.is_empty() {
            return Err(Error::NoFilesAvailable);
        }

        let folder = match destination {
            Some(path) => path.to_path_buf(),
            None => std::env::current_dir()?.join(job_id),
        };
        tokio::fs::create_dir_all(&folder).await?;

        tracing::info!(
            job_id = %job_id,
            folder = %folder.display(),
            count = files.len(),
            "retrieving result files"
        );

        let results: Vec<Result<PathBuf>> = stream::iter(files)
            .map(|uri| {
                let client = self.client.clone();
                let target = folder.join(file_name_for(uri));
                async move {
                    client.download(uri, &target).await?;
                    Ok(target)
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut paths = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(path) => paths.push(path),
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "result file download failed");
                    return Err(e);
                }
            }
        }
        Ok(paths)
    }
}
